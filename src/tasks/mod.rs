//! 后台任务：有界队列 + 并发分发 + 指数退避重试 + 死信
//!
//! 热路径只负责入队，点击落库与 webhook 投递都在这里完成。

pub mod job;
pub mod queue;
pub mod webhook;

pub use job::{BackgroundJob, DefaultJobHandler, JobHandler, WebhookDelivery, WebhookEvent, WebhookTrigger};
pub use queue::{DeadLetter, DeadLetterSink, JobQueue};
pub use webhook::{HttpWebhookPublisher, NoopWebhookPublisher, WebhookPublisher, create_publisher};
