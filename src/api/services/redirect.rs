use std::sync::Arc;

use actix_web::http::{Method, StatusCode, header};
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use chrono::Utc;
use tracing::{debug, error, trace, warn};

use crate::errors::DubError;
use crate::services::resolver::{append_click_id, select_destination};
use crate::services::{ClickTracker, LinkResolver, RedirectTarget};
use crate::storage::CachedLink;
use crate::utils::request::VisitorInfo;

pub struct RedirectService;

impl RedirectService {
    pub async fn handle_redirect(
        req: HttpRequest,
        resolver: web::Data<Arc<LinkResolver>>,
        tracker: web::Data<Arc<ClickTracker>>,
    ) -> HttpResponse {
        // 路由参数已被解码过一次，取原始路径交给 resolver 统一解码
        let raw_key = req.uri().path().to_string();
        let host = req.connection_info().host().to_string();

        let resolved = match resolver.resolve(&host, &raw_key).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                debug!("No link for {}/{}", host, raw_key);
                return Self::plain(StatusCode::NOT_FOUND, "Not Found");
            }
            Err(e) => {
                error!("Redirect lookup failed for {}/{}: {}", host, raw_key, e);
                return e.error_response();
            }
        };
        let link = resolved.link;
        trace!("Resolved {}:{} from {:?}", link.domain, link.key, resolved.source);

        let visitor = VisitorInfo::from_request(&req);
        let now = Utc::now();
        let destination = match select_destination(&link, &visitor, now) {
            RedirectTarget::Url(url) => url,
            RedirectTarget::Gone => return Self::plain(StatusCode::GONE, "Gone"),
        };

        // 过期跳转与 HEAD 探测都不计点击
        if link.is_expired(now) || req.method() == Method::HEAD {
            return Self::found(&destination);
        }

        let location = Self::record_click(&tracker, &link, destination, visitor).await;
        Self::found(&location)
    }

    /// 记录点击并返回最终跳转地址；记录失败不影响跳转
    async fn record_click(
        tracker: &ClickTracker,
        link: &CachedLink,
        destination: String,
        visitor: VisitorInfo,
    ) -> String {
        match tracker.track(link, &destination, visitor).await {
            Ok(outcome) => match outcome.click_id() {
                Some(click_id) if link.track_conversion => append_click_id(&destination, click_id),
                _ => destination,
            },
            Err(DubError::RateLimitExceeded(_)) => {
                debug!("Click on {} rate limited, redirecting without recording", link.id);
                destination
            }
            Err(e) => {
                warn!("Failed to record click on {}: {}", link.id, e);
                destination
            }
        }
    }

    #[inline]
    fn found(location: &str) -> HttpResponse {
        HttpResponse::Found()
            .insert_header((header::LOCATION, location))
            .insert_header((header::CACHE_CONTROL, "private, max-age=0"))
            .finish()
    }

    #[inline]
    fn plain(status: StatusCode, body: &'static str) -> HttpResponse {
        HttpResponse::build(status)
            .insert_header((header::CONTENT_TYPE, "text/plain; charset=utf-8"))
            .body(body)
    }
}

/// 兜底路由，须最后注册
pub fn redirect_routes() -> actix_web::Resource {
    web::resource("/{key:.*}")
        .route(web::get().to(RedirectService::handle_redirect))
        .route(web::head().to(RedirectService::handle_redirect))
}
