//! SeaORM storage backend
//!
//! SQLite、MySQL/MariaDB、PostgreSQL 共用一套实现。

mod click_sink;
mod connection;
mod conversions;
mod converters;
mod dead_letters;
mod events;
mod links;
mod payouts;
pub mod retry;
mod workspaces;

use std::future::Future;

use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::errors::{DubError, Result};

pub use connection::{connect, run_migrations};
pub use converters::*;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<String> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
    {
        Ok("sqlite".to_string())
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql".to_string())
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        Ok("postgres".to_string())
    } else {
        Err(DubError::database_config(format!(
            "Cannot infer database type from URL: {}. Supported: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

/// SeaORM-based storage backend
#[derive(Clone)]
pub struct SeaOrmStorage {
    db: DatabaseConnection,
    backend_name: String,
    retry_policy: retry::RetryPolicy,
}

impl SeaOrmStorage {
    /// 连接数据库并运行迁移
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let database_url = config.database_url.as_str();
        if database_url.is_empty() {
            return Err(DubError::database_config("database_url is not set"));
        }

        let backend_name = infer_backend_from_url(database_url)?;
        let db = connect(database_url, &backend_name, config.pool_size).await?;

        run_migrations(&db).await?;

        let storage = Self::from_connection(db, &backend_name, retry::RetryPolicy::from(config));
        info!("{} storage initialized", backend_name.to_uppercase());
        Ok(storage)
    }

    /// 复用已建立的连接（迁移由调用方负责）
    pub fn from_connection(
        db: DatabaseConnection,
        backend_name: &str,
        retry_policy: retry::RetryPolicy,
    ) -> Self {
        Self {
            db,
            backend_name: backend_name.to_string(),
            retry_policy,
        }
    }

    pub fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// 就绪检查
    pub async fn ping(&self) -> Result<()> {
        self.db
            .execute_unprepared("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| DubError::database_connection(e.to_string()))
    }

    /// 带重试的数据库操作，错误统一转换为 DubError
    async fn retrying<T, F, Fut>(&self, operation_name: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, DbErr>>,
    {
        retry::retry_transient(operation_name, self.retry_policy, operation)
            .await
            .map_err(DubError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://dub.db?mode=rwc").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("data/dub.db").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("mysql://u:p@localhost/dub").unwrap(), "mysql");
        assert_eq!(infer_backend_from_url("mariadb://localhost/dub").unwrap(), "mysql");
        assert_eq!(infer_backend_from_url("postgres://localhost/dub").unwrap(), "postgres");
        assert!(infer_backend_from_url("redis://localhost").is_err());
    }
}
