//! Background queue: click events reach the store, failing webhooks end up as dead letters

mod common;

use std::time::Duration;

use dub_core::analytics::EventStore;
use dub_core::services::ClickOutcome;
use dub_core::utils::request::VisitorInfo;

#[tokio::test]
async fn test_click_job_reaches_event_store() {
    let env = common::setup().await;
    let ws = env.workspace("acme").await;
    env.link(Some(&ws), "promo", "https://acme.example").await;

    let link = env.ctx.resolver.resolve("dub.sh", "promo").await.unwrap().unwrap().link;
    let visitor = VisitorInfo {
        ip: "8.8.8.8".to_string(),
        ..VisitorInfo::default()
    };
    let outcome = env.ctx.tracker.track(&link, &link.url, visitor).await.unwrap();
    let ClickOutcome::Recorded(click_id) = outcome else {
        panic!("expected a recorded click, got {outcome:?}");
    };

    assert!(env.ctx.queue.wait_idle(Duration::from_secs(5)).await);
    let stored = env
        .ctx
        .storage
        .get_click_event(&click_id)
        .await
        .unwrap()
        .expect("click event should be stored");
    assert_eq!(stored.link_id, link.id);
    assert_eq!(stored.workspace_id.as_deref(), Some(ws.id.as_str()));
    assert!(env.ctx.storage.list_dead_letters().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_webhook_becomes_dead_letter() {
    let env = common::setup_with(|config| {
        // 本机 9 端口无监听，投递必然失败
        config.webhooks.endpoints = vec!["http://127.0.0.1:9/hook".to_string()];
        config.webhooks.timeout_secs = 1;
        config.queue.max_attempts = 2;
    })
    .await;

    env.link(None, "demo", "https://example.com").await;
    assert!(env.ctx.queue.wait_idle(Duration::from_secs(10)).await);

    let letters = env.ctx.storage.list_dead_letters().await.unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].job_kind, "webhook");
    assert_eq!(letters[0].attempts, 2);
    assert!(letters[0].payload.contains("link.created"));
}
