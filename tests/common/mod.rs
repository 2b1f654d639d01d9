//! Shared setup for integration tests: temp SQLite + in-process cache

#![allow(dead_code)]

use std::sync::Arc;

use dub_core::cache::KvStore;
use dub_core::cache::kv::MokaKvStore;
use dub_core::config::{LinksConfig, StaticConfig};
use dub_core::runtime::lifetime::startup::{StartupContext, assemble};
use dub_core::storage::{LinkInput, LinkModel, StorageFactory, Workspace};
use dub_core::utils::{generate_api_token, hash_token};
use tempfile::TempDir;

pub struct TestEnv {
    // 保持临时目录存活
    _dir: TempDir,
    pub config: StaticConfig,
    pub ctx: StartupContext,
}

pub fn test_config(dir: &TempDir) -> StaticConfig {
    let mut config = StaticConfig::default();
    config.database.database_url = format!(
        "sqlite://{}?mode=rwc",
        dir.path().join("dub_test.db").display()
    );
    config.cache.cache_type = "memory".to_string();
    config.links = LinksConfig {
        default_domain: "dub.sh".to_string(),
        home_hostnames: vec!["localhost:8888".to_string()],
        case_sensitive_domains: vec!["case.link".to_string()],
        random_key_length: 7,
    };
    config.queue.backoff_base_ms = 10;
    config.queue.backoff_max_ms = 50;
    config
}

pub async fn setup() -> TestEnv {
    setup_with(|_| {}).await
}

pub async fn setup_with(adjust: impl FnOnce(&mut StaticConfig)) -> TestEnv {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let mut config = test_config(&dir);
    adjust(&mut config);

    let storage = StorageFactory::create(&config.database)
        .await
        .expect("Failed to create storage");
    let kv: Arc<dyn KvStore> = Arc::new(
        MokaKvStore::new(&config.cache)
            .await
            .expect("Failed to create moka store"),
    );
    let ctx = assemble(&config, storage, kv);

    TestEnv {
        _dir: dir,
        config,
        ctx,
    }
}

impl TestEnv {
    pub async fn workspace(&self, slug: &str) -> Workspace {
        self.ctx
            .storage
            .create_workspace(slug, &format!("{} workspace", slug))
            .await
            .expect("Failed to create workspace")
    }

    /// 新建 workspace token，返回明文
    pub async fn token(&self, workspace: &Workspace) -> String {
        let token = generate_api_token();
        self.ctx
            .storage
            .create_workspace_token(&workspace.id, "test", &hash_token(&token))
            .await
            .expect("Failed to create token");
        token
    }

    pub async fn link(&self, workspace: Option<&Workspace>, key: &str, url: &str) -> LinkModel {
        self.link_with(LinkInput {
            domain: "dub.sh".to_string(),
            key: Some(key.to_string()),
            url: url.to_string(),
            workspace_id: workspace.map(|w| w.id.clone()),
            track_conversion: true,
            ..LinkInput::default()
        })
        .await
    }

    pub async fn link_with(&self, input: LinkInput) -> LinkModel {
        self.ctx
            .link_service
            .create(input)
            .await
            .expect("Failed to create link")
    }
}
