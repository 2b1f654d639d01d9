//! click → lead → sale → commission chain

mod common;

use std::time::Duration;

use chrono::Utc;
use dub_core::analytics::EventStore;
use dub_core::cache::CacheResult;
use dub_core::services::click_tracker::click_cache_key;
use dub_core::services::conversion::invoice_key;
use dub_core::services::{ClickOutcome, TrackLeadRequest, TrackSaleRequest};
use dub_core::storage::{
    CachedLink, LinkInput, RewardEvent, RewardKind, SaleStatus, Workspace,
};
use dub_core::utils::request::VisitorInfo;
use migration::entities::customer;
use sea_orm::ActiveModelTrait;
use sea_orm::ActiveValue::Set;

fn visitor(ip: &str) -> VisitorInfo {
    VisitorInfo {
        ip: ip.to_string(),
        device: "Desktop".to_string(),
        browser: "Chrome".to_string(),
        os: "Mac OSX".to_string(),
        country: Some("US".to_string()),
        referer: "(direct)".to_string(),
        ..VisitorInfo::default()
    }
}

fn lead_request(click_id: &str, external_id: &str) -> TrackLeadRequest {
    TrackLeadRequest {
        click_id: click_id.to_string(),
        event_name: "Sign up".to_string(),
        external_id: external_id.to_string(),
        customer_name: Some("Jane".to_string()),
        customer_email: Some("jane@example.com".to_string()),
        customer_avatar: None,
        metadata: None,
    }
}

fn sale_request(external_id: &str, amount: i64, invoice_id: Option<&str>) -> TrackSaleRequest {
    TrackSaleRequest {
        external_id: external_id.to_string(),
        amount,
        payment_processor: "stripe".to_string(),
        event_name: None,
        invoice_id: invoice_id.map(String::from),
        currency: None,
        metadata: None,
    }
}

async fn cached(env: &common::TestEnv, key: &str) -> CachedLink {
    env.ctx
        .resolver
        .resolve("dub.sh", key)
        .await
        .unwrap()
        .expect("link should resolve")
        .link
}

async fn click(env: &common::TestEnv, key: &str, ip: &str) -> String {
    let link = cached(env, key).await;
    match env.ctx.tracker.track(&link, &link.url, visitor(ip)).await.unwrap() {
        ClickOutcome::Recorded(id) => id,
        other => panic!("expected a recorded click, got {other:?}"),
    }
}

async fn workspace_with_link(env: &common::TestEnv) -> Workspace {
    let ws = env.workspace("acme").await;
    env.link(Some(&ws), "promo", "https://acme.example/pricing").await;
    ws
}

#[tokio::test]
async fn test_lead_then_sale_updates_counters() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;
    let click_id = click(&env, "promo", "8.8.8.8").await;

    let lead = env
        .ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "user_1"))
        .await
        .unwrap();
    assert_eq!(lead.click.id, click_id);
    assert_eq!(lead.customer.external_id, "user_1");
    assert_eq!(lead.customer.name.as_deref(), Some("Jane"));

    let sale = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("user_1", 4_900, Some("in_1")))
        .await
        .unwrap();
    assert_eq!(sale.event_name, "Purchase");
    let summary = sale.sale.expect("sale should be recorded");
    assert_eq!(summary.amount, 4_900);
    assert_eq!(summary.currency, "usd");

    let link = cached(&env, "promo").await;
    let stored = env.ctx.storage.find_link_by_id(&link.id).await.unwrap().unwrap();
    assert_eq!(stored.leads, 1);
    assert_eq!(stored.sales, 1);
    assert_eq!(stored.sale_amount, 4_900);

    let ws = env.ctx.storage.find_workspace(&ws.id).await.unwrap().unwrap();
    assert_eq!(ws.leads_usage, 1);
    assert_eq!(ws.sales_usage, 4_900);
}

#[tokio::test]
async fn test_invoice_is_recorded_once() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;
    let click_id = click(&env, "promo", "8.8.8.8").await;
    env.ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "user_1"))
        .await
        .unwrap();

    let first = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("user_1", 1_000, Some("in_dup")))
        .await
        .unwrap();
    let second = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("user_1", 1_000, Some("in_dup")))
        .await
        .unwrap();

    assert!(first.sale.is_some());
    assert!(second.customer.is_none());
    assert!(second.sale.is_none());

    let link = cached(&env, "promo").await;
    let stored = env.ctx.storage.find_link_by_id(&link.id).await.unwrap().unwrap();
    assert_eq!(stored.sales, 1);
    assert_eq!(stored.sale_amount, 1_000);

    // 没有 invoice 的销售不做去重
    for _ in 0..2 {
        env.ctx
            .conversions
            .track_sale(&ws, sale_request("user_1", 10, None))
            .await
            .unwrap();
    }
    let stored = env.ctx.storage.find_link_by_id(&link.id).await.unwrap().unwrap();
    assert_eq!(stored.sales, 3);
}

#[tokio::test]
async fn test_lead_falls_back_to_event_store() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;
    let click_id = click(&env, "promo", "8.8.8.8").await;

    // 等点击落库后清掉 clickIdCache
    assert!(env.ctx.queue.wait_idle(Duration::from_secs(5)).await);
    env.ctx.kv.del(&[click_cache_key(&click_id)]).await.unwrap();

    let lead = env
        .ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "user_2"))
        .await
        .unwrap();
    assert_eq!(lead.click.id, click_id);
}

#[tokio::test]
async fn test_lead_errors() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;
    let other = env.workspace("other").await;
    let click_id = click(&env, "promo", "8.8.8.8").await;

    let missing = env
        .ctx
        .conversions
        .track_lead(&ws, lead_request("nope", "user_1"))
        .await
        .unwrap_err();
    assert_eq!(missing.code(), "not_found");

    let foreign = env
        .ctx
        .conversions
        .track_lead(&other, lead_request(&click_id, "user_1"))
        .await
        .unwrap_err();
    assert_eq!(foreign.code(), "forbidden");

    let blank = env
        .ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "  "))
        .await
        .unwrap_err();
    assert_eq!(blank.code(), "bad_request");
}

#[tokio::test]
async fn test_sale_errors() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;

    let unknown = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("ghost", 100, None))
        .await
        .unwrap_err();
    assert_eq!(unknown.code(), "not_found");

    let mut bad = sale_request("ghost", 100, None);
    bad.payment_processor = "cash".to_string();
    let invalid = env.ctx.conversions.track_sale(&ws, bad).await.unwrap_err();
    assert_eq!(invalid.code(), "bad_request");

    let negative = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("ghost", -1, None))
        .await
        .unwrap_err();
    assert_eq!(negative.code(), "bad_request");
}

#[tokio::test]
async fn test_partner_sale_creates_commission() {
    let env = common::setup().await;
    let ws = env.workspace("acme").await;
    let program = env
        .ctx
        .storage
        .create_program(&ws.id, "Acme Partners", "acme-partners")
        .await
        .unwrap();
    let partner = env
        .ctx
        .partner_service
        .create_partner(&program.id, "Jane", Some("jane@example.com"))
        .await
        .unwrap();
    env.ctx
        .storage
        .create_reward(&program.id, None, RewardEvent::Sale, RewardKind::Percentage, 10)
        .await
        .unwrap();

    env.link_with(LinkInput {
        key: Some("jane".to_string()),
        url: "https://acme.example".to_string(),
        workspace_id: Some(ws.id.clone()),
        track_conversion: true,
        program_id: Some(program.id.clone()),
        partner_id: Some(partner.id.clone()),
        ..LinkInput::default()
    })
    .await;

    let click_id = click(&env, "jane", "1.1.1.1").await;
    env.ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "buyer"))
        .await
        .unwrap();
    env.ctx
        .conversions
        .track_sale(&ws, sale_request("buyer", 5_000, Some("in_partner")))
        .await
        .unwrap();

    let sales = env
        .ctx
        .storage
        .sales_for_partner(&program.id, &partner.id)
        .await
        .unwrap();
    assert_eq!(sales.len(), 1);
    assert_eq!(sales[0].amount, 5_000);
    assert_eq!(sales[0].earnings, 500);
    assert_eq!(sales[0].status, SaleStatus::Pending);
    assert_eq!(sales[0].invoice_id.as_deref(), Some("in_partner"));
}

#[tokio::test]
async fn test_sale_without_partner_has_no_commission() {
    let env = common::setup().await;
    let ws = env.workspace("acme").await;
    let program = env
        .ctx
        .storage
        .create_program(&ws.id, "Acme Partners", "acme-partners")
        .await
        .unwrap();
    let partner = env
        .ctx
        .partner_service
        .create_partner(&program.id, "Jane", None)
        .await
        .unwrap();
    // 专属规则金额为 0
    env.ctx
        .storage
        .create_reward(&program.id, Some(&partner.id), RewardEvent::Sale, RewardKind::Flat, 0)
        .await
        .unwrap();
    env.ctx
        .storage
        .create_reward(&program.id, None, RewardEvent::Sale, RewardKind::Percentage, 10)
        .await
        .unwrap();

    env.link_with(LinkInput {
        key: Some("jane".to_string()),
        url: "https://acme.example".to_string(),
        workspace_id: Some(ws.id.clone()),
        program_id: Some(program.id.clone()),
        partner_id: Some(partner.id.clone()),
        ..LinkInput::default()
    })
    .await;

    let click_id = click(&env, "jane", "1.1.1.1").await;
    env.ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "buyer"))
        .await
        .unwrap();
    env.ctx
        .conversions
        .track_sale(&ws, sale_request("buyer", 5_000, None))
        .await
        .unwrap();

    assert!(env
        .ctx
        .storage
        .sales_for_partner(&program.id, &partner.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_same_invoice_id_in_two_workspaces() {
    let env = common::setup().await;
    let a = workspace_with_link(&env).await;
    let b = env.workspace("shop").await;
    env.link(Some(&b), "shop", "https://shop.example").await;

    for (ws, key, ip) in [(&a, "promo", "8.8.8.8"), (&b, "shop", "9.9.9.9")] {
        let click_id = click(&env, key, ip).await;
        env.ctx
            .conversions
            .track_lead(ws, lead_request(&click_id, "buyer"))
            .await
            .unwrap();
        let sale = env
            .ctx
            .conversions
            .track_sale(ws, sale_request("buyer", 2_500, Some("1001")))
            .await
            .unwrap();
        assert!(sale.sale.is_some(), "sale for {} should be recorded", ws.slug);
    }

    for ws in [&a, &b] {
        let ws = env.ctx.storage.find_workspace(&ws.id).await.unwrap().unwrap();
        assert_eq!(ws.sales_usage, 2_500);
    }
}

#[tokio::test]
async fn test_failed_sale_writes_nothing_and_releases_invoice() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;
    let click_id = click(&env, "promo", "8.8.8.8").await;
    let lead = env
        .ctx
        .conversions
        .track_lead(&ws, lead_request(&click_id, "user_1"))
        .await
        .unwrap();

    // 链接被删除后计数更新失败，整个销售事务回滚
    let link = cached(&env, "promo").await;
    env.ctx.link_service.delete_many(&[link.id.clone()]).await.unwrap();

    let err = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("user_1", 1_000, Some("in_retry")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");

    let events = env.ctx.storage.list_sale_events(&env.ctx.storage.find_customer(&ws.id, "user_1").await.unwrap().unwrap().id).await.unwrap();
    assert!(events.is_empty());
    assert!(matches!(
        env.ctx.kv.get(&invoice_key(&ws.id, "in_retry")).await,
        CacheResult::Miss
    ));
    let ws = env.ctx.storage.find_workspace(&ws.id).await.unwrap().unwrap();
    assert_eq!(ws.sales_usage, 0);
}

#[tokio::test]
async fn test_failed_lead_writes_no_customer() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;
    let other = env.workspace("other").await;
    let click_id = click(&env, "promo", "8.8.8.8").await;

    env.ctx
        .conversions
        .track_lead(&ws, lead_request("missing_click", "user_1"))
        .await
        .unwrap_err();
    env.ctx
        .conversions
        .track_lead(&other, lead_request(&click_id, "user_1"))
        .await
        .unwrap_err();

    for ws in [&ws, &other] {
        assert!(env.ctx.storage.find_customer(&ws.id, "user_1").await.unwrap().is_none());
    }
    let link = env.ctx.storage.find_link_by_id(&cached(&env, "promo").await.id).await.unwrap().unwrap();
    assert_eq!(link.leads, 0);
}

#[tokio::test]
async fn test_sale_for_customer_without_lead_writes_nothing() {
    let env = common::setup().await;
    let ws = workspace_with_link(&env).await;

    let orphan = customer::ActiveModel {
        id: Set("cus_orphan".to_string()),
        workspace_id: Set(ws.id.clone()),
        external_id: Set("orphan".to_string()),
        name: Set(None),
        email: Set(None),
        avatar: Set(None),
        link_id: Set(None),
        click_id: Set(None),
        country: Set(None),
        created_at: Set(Utc::now()),
    };
    orphan.insert(env.ctx.storage.get_db()).await.unwrap();

    let err = env
        .ctx
        .conversions
        .track_sale(&ws, sale_request("orphan", 1_000, Some("in_orphan")))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");

    assert!(env.ctx.storage.list_sale_events("cus_orphan").await.unwrap().is_empty());
    let ws = env.ctx.storage.find_workspace(&ws.id).await.unwrap().unwrap();
    assert_eq!(ws.sales_usage, 0);
}
