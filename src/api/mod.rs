//! HTTP surface: redirects, conversion tracking, public stats, health

pub mod middleware;
pub mod services;

use actix_web::web;

use crate::errors::DubError;
use crate::runtime::lifetime::startup::StartupContext;
use services::{AppStartTime, health_routes, redirect_routes, share_routes, track_routes};

/// 请求体上限
const MAX_PAYLOAD_BYTES: usize = 1024 * 1024;

/// 注册共享状态与全部路由；重定向兜底路由放在最后
pub fn configure(cfg: &mut web::ServiceConfig, ctx: &StartupContext, start: &AppStartTime) {
    cfg.app_data(web::Data::new(ctx.storage.clone()))
        .app_data(web::Data::new(ctx.queue.clone()))
        .app_data(web::Data::new(ctx.resolver.clone()))
        .app_data(web::Data::new(ctx.tracker.clone()))
        .app_data(web::Data::new(ctx.conversions.clone()))
        .app_data(web::Data::new(start.clone()))
        .app_data(web::PayloadConfig::new(MAX_PAYLOAD_BYTES))
        .app_data(
            web::JsonConfig::default()
                .limit(MAX_PAYLOAD_BYTES)
                .error_handler(|err, _req| DubError::bad_request(err.to_string()).into()),
        )
        .service(health_routes())
        .service(track_routes(ctx.authenticator.clone()))
        .service(share_routes())
        .service(redirect_routes());
}
