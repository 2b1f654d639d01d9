//! HTTP surface end to end: redirect, tracking, share, health

mod common;

use actix_web::http::{Method, StatusCode, header};
use actix_web::{App, test};
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use dub_core::api;
use dub_core::api::middleware::RequestIdMiddleware;
use dub_core::api::services::AppStartTime;
use dub_core::storage::LinkInput;

const PEER: &str = "8.8.8.8:40000";

macro_rules! app {
    ($env:expr) => {{
        let start = AppStartTime {
            start_datetime: Utc::now(),
        };
        test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .configure(|cfg| api::configure(cfg, &$env.ctx, &start)),
        )
        .await
    }};
}

fn get(path: &str) -> test::TestRequest {
    test::TestRequest::get()
        .uri(path)
        .insert_header((header::HOST, "dub.sh"))
        .peer_addr(PEER.parse().unwrap())
}

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[actix_rt::test]
async fn test_redirect_appends_click_id() {
    let env = common::setup().await;
    let ws = env.workspace("acme").await;
    env.link(Some(&ws), "promo", "https://acme.example/pricing").await;
    let app = app!(env);

    let resp = test::call_service(&app, get("/promo").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(
        resp.headers().get(header::CACHE_CONTROL).unwrap(),
        "private, max-age=0"
    );
    assert!(resp.headers().contains_key("x-request-id"));
    let first = location(&resp);
    assert!(first.starts_with("https://acme.example/pricing?dub_id="));

    // 同一访客在去重窗口内拿到同一个 click ID
    let resp = test::call_service(&app, get("/promo").to_request()).await;
    assert_eq!(location(&resp), first);
}

#[actix_rt::test]
async fn test_redirect_without_conversion_tracking() {
    let env = common::setup().await;
    env.link_with(LinkInput {
        key: Some("plain".to_string()),
        url: "https://example.com/a".to_string(),
        ..LinkInput::default()
    })
    .await;
    let app = app!(env);

    let resp = test::call_service(&app, get("/plain").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com/a");
}

#[actix_rt::test]
async fn test_redirect_decodes_key_once() {
    let env = common::setup().await;
    for (key, url) in [("a%41", "https://example.com/literal"), ("aA", "https://example.com/other")] {
        env.link_with(LinkInput {
            key: Some(key.to_string()),
            url: url.to_string(),
            ..LinkInput::default()
        })
        .await;
    }
    let app = app!(env);

    // %25 → '%'，结果是字面量 a%41
    let resp = test::call_service(&app, get("/a%2541").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com/literal");

    let resp = test::call_service(&app, get("/a%41").to_request()).await;
    assert_eq!(location(&resp), "https://example.com/other");
}

#[actix_rt::test]
async fn test_redirect_not_found_and_gone() {
    let env = common::setup().await;
    env.link_with(LinkInput {
        key: Some("old".to_string()),
        url: "https://example.com".to_string(),
        expires_at: Some(Utc::now() - Duration::hours(1)),
        ..LinkInput::default()
    })
    .await;
    env.link_with(LinkInput {
        key: Some("moved".to_string()),
        url: "https://example.com".to_string(),
        expires_at: Some(Utc::now() - Duration::hours(1)),
        expired_url: Some("https://example.com/expired".to_string()),
        track_conversion: true,
        ..LinkInput::default()
    })
    .await;
    let app = app!(env);

    let resp = test::call_service(&app, get("/missing").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(&app, get("/old").to_request()).await;
    assert_eq!(resp.status(), StatusCode::GONE);

    // 过期跳转不计点击，也不带 dub_id
    let resp = test::call_service(&app, get("/moved").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com/expired");
}

#[actix_rt::test]
async fn test_head_and_geo_redirects() {
    let env = common::setup().await;
    env.link_with(LinkInput {
        key: Some("geo".to_string()),
        url: "https://example.com".to_string(),
        track_conversion: true,
        geo: Some([("de".to_string(), "https://example.de".to_string())].into()),
        ..LinkInput::default()
    })
    .await;
    let app = app!(env);

    let resp = test::call_service(
        &app,
        get("/geo").method(Method::HEAD).to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "https://example.com");
    assert_eq!(env.ctx.clicks.buffered(), 0);

    let resp = test::call_service(
        &app,
        get("/geo")
            .insert_header(("x-vercel-ip-country", "DE"))
            .to_request(),
    )
    .await;
    assert!(location(&resp).starts_with("https://example.de/?dub_id="));
    assert_eq!(env.ctx.clicks.buffered(), 1);
}

#[actix_rt::test]
async fn test_track_click_endpoint() {
    let env = common::setup().await;
    let ws = env.workspace("acme").await;
    env.link(Some(&ws), "promo", "https://acme.example").await;
    let app = app!(env);

    let req = test::TestRequest::post()
        .uri("/track/click")
        .peer_addr(PEER.parse().unwrap())
        .set_json(json!({"domain": "dub.sh", "key": "promo"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["clickId"].as_str().is_some_and(|id| !id.is_empty()));

    let req = test::TestRequest::post()
        .uri("/track/click")
        .peer_addr(PEER.parse().unwrap())
        .set_json(json!({"domain": "dub.sh", "key": "nope"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/track/click")
        .peer_addr(PEER.parse().unwrap())
        .insert_header((
            header::USER_AGENT,
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)",
        ))
        .set_json(json!({"domain": "dub.sh", "key": "promo"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["clickId"].is_null());

    let req = test::TestRequest::post()
        .uri("/track/click")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_rt::test]
async fn test_conversion_endpoints_require_token() {
    let env = common::setup().await;
    let app = app!(env);

    let req = test::TestRequest::post()
        .uri("/track/lead")
        .set_json(json!({"clickId": "x", "eventName": "Sign up", "externalId": "u"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "unauthorized");
    assert_eq!(body["error"]["message"], "Missing Authorization header.");
    assert!(body["error"]["doc_url"].as_str().unwrap().ends_with("#unauthorized"));

    let req = test::TestRequest::post()
        .uri("/track/sale")
        .insert_header((header::AUTHORIZATION, "Bearer dub_bogus"))
        .set_json(json!({"externalId": "u", "amount": 100, "paymentProcessor": "stripe"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_rt::test]
async fn test_click_lead_sale_over_http() {
    let env = common::setup().await;
    let ws = env.workspace("acme").await;
    let token = env.token(&ws).await;
    env.link(Some(&ws), "promo", "https://acme.example").await;
    let app = app!(env);
    let bearer = format!("Bearer {token}");

    let req = test::TestRequest::post()
        .uri("/track/click")
        .peer_addr(PEER.parse().unwrap())
        .set_json(json!({"domain": "dub.sh", "key": "promo"}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let click_id = body["clickId"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/track/lead")
        .insert_header((header::AUTHORIZATION, bearer.as_str()))
        .set_json(json!({
            "clickId": click_id,
            "eventName": "Sign up",
            "externalId": "user_1",
            "customerEmail": "jane@example.com",
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["click"]["id"], click_id.as_str());
    assert_eq!(body["customer"]["externalId"], "user_1");

    let sale = json!({
        "externalId": "user_1",
        "amount": 2_500,
        "paymentProcessor": "stripe",
        "invoiceId": "in_http",
    });
    let req = test::TestRequest::post()
        .uri("/track/sale")
        .insert_header((header::AUTHORIZATION, bearer.as_str()))
        .set_json(&sale)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["eventName"], "Purchase");
    assert_eq!(body["sale"]["amount"], 2_500);

    let req = test::TestRequest::post()
        .uri("/track/sale")
        .insert_header((header::AUTHORIZATION, bearer.as_str()))
        .set_json(&sale)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["customer"].is_null());
    assert!(body["sale"].is_null());
}

#[actix_rt::test]
async fn test_share_stats() {
    let env = common::setup().await;
    env.link_with(LinkInput {
        key: Some("open".to_string()),
        url: "https://example.com".to_string(),
        public_stats: true,
        ..LinkInput::default()
    })
    .await;
    env.link_with(LinkInput {
        key: Some("closed".to_string()),
        url: "https://example.com".to_string(),
        ..LinkInput::default()
    })
    .await;
    let app = app!(env);

    let body: Value =
        test::call_and_read_body_json(&app, get("/share/dub.sh/open").to_request()).await;
    assert_eq!(body["key"], "open");
    assert_eq!(body["clicks"], 0);

    let resp = test::call_service(&app, get("/share/dub.sh/closed").to_request()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = test::call_service(&app, get("/share/dub.sh/none").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_rt::test]
async fn test_health_endpoints() {
    let env = common::setup().await;
    let app = app!(env);

    let body: Value = test::call_and_read_body_json(&app, get("/health").to_request()).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"]["status"], "healthy");
    assert_eq!(body["storage"]["backend"], "sqlite");

    let resp = test::call_service(&app, get("/health/ready").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = test::call_service(&app, get("/health/live").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}
