//! webhook 投递

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};
use ureq::Agent;

use super::job::WebhookEvent;
use crate::config::WebhooksConfig;
use crate::errors::{DubError, Result};

#[async_trait]
pub trait WebhookPublisher: Send + Sync {
    /// 目标端点；队列按端点拆分任务，各自重试
    fn endpoints(&self) -> &[String];

    async fn deliver(&self, endpoint: &str, event: &WebhookEvent) -> Result<()>;
}

/// 未配置任何端点时使用
pub struct NoopWebhookPublisher;

#[async_trait]
impl WebhookPublisher for NoopWebhookPublisher {
    fn endpoints(&self) -> &[String] {
        &[]
    }

    async fn deliver(&self, endpoint: &str, event: &WebhookEvent) -> Result<()> {
        debug!("Webhook publisher disabled, dropping {} for {}", event.event, endpoint);
        Ok(())
    }
}

/// 以 JSON POST 到端点
pub struct HttpWebhookPublisher {
    endpoints: Vec<String>,
    agent: Agent,
}

impl HttpWebhookPublisher {
    pub fn new(endpoints: Vec<String>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { endpoints, agent }
    }

    /// 同步发送（在 spawn_blocking 中调用）
    fn post_sync(agent: &Agent, url: &str, body: &WebhookEvent) -> std::result::Result<(), String> {
        agent
            .post(url)
            .header("Content-Type", "application/json")
            .header("Dub-Webhook-Event", body.event.to_string())
            .send_json(body)
            .map(|_| ())
            .map_err(|e| format!("POST {} failed: {}", url, e))
    }
}

#[async_trait]
impl WebhookPublisher for HttpWebhookPublisher {
    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn deliver(&self, endpoint: &str, event: &WebhookEvent) -> Result<()> {
        let agent = self.agent.clone();
        let url = endpoint.to_string();
        let body = event.clone();

        tokio::task::spawn_blocking(move || Self::post_sync(&agent, &url, &body))
            .await
            .map_err(|e| DubError::internal(format!("webhook task panicked: {}", e)))?
            .map_err(|failure| {
                warn!("Webhook {} delivery error: {}", event.id, failure);
                DubError::internal(failure)
            })?;

        debug!("Webhook {} ({}) delivered to {}", event.id, event.event, endpoint);
        Ok(())
    }
}

pub fn create_publisher(config: &WebhooksConfig) -> Arc<dyn WebhookPublisher> {
    if config.endpoints.is_empty() {
        Arc::new(NoopWebhookPublisher)
    } else {
        Arc::new(HttpWebhookPublisher::new(
            config.endpoints.clone(),
            Duration::from_secs(config.timeout_secs),
        ))
    }
}
