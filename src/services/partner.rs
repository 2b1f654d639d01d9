use std::sync::Arc;

use tracing::info;

use crate::errors::{DubError, Result};
use crate::storage::{Partner, SeaOrmStorage};
use crate::tasks::{BackgroundJob, JobQueue, WebhookEvent, WebhookTrigger};

pub struct PartnerService {
    storage: Arc<SeaOrmStorage>,
    queue: JobQueue,
}

impl PartnerService {
    pub fn new(storage: Arc<SeaOrmStorage>, queue: JobQueue) -> Self {
        Self { storage, queue }
    }

    /// 创建合作伙伴并直接以 approved 状态加入计划
    pub async fn create_partner(
        &self,
        program_id: &str,
        name: &str,
        email: Option<&str>,
    ) -> Result<Partner> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DubError::bad_request("Partner name is required."));
        }
        let program = self
            .storage
            .find_program(program_id)
            .await?
            .ok_or_else(|| DubError::not_found(format!("Program {} not found", program_id)))?;

        let partner = self
            .storage
            .create_partner_with_enrollment(&program.id, name, email)
            .await?;

        self.queue.enqueue(BackgroundJob::Webhook(WebhookEvent::new(
            WebhookTrigger::PartnerCreated,
            serde_json::json!({
                "id": partner.id,
                "name": partner.name,
                "email": partner.email,
                "programId": program.id,
                "workspaceId": program.workspace_id,
                "status": "approved",
            }),
        )));

        info!("Partner {} enrolled in {}", partner.id, program.id);
        Ok(partner)
    }
}
