//! Conversion tracking endpoints
//!
//! `/track/click` 公开；`/track/lead` 与 `/track/sale` 需要 workspace token。

use std::sync::Arc;

use actix_web::{HttpRequest, HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::middleware::{WorkspaceAuth, WorkspaceAuthenticator};
use crate::errors::{DubError, Result};
use crate::services::{ClickTracker, ConversionService, LinkResolver, TrackLeadRequest, TrackSaleRequest};
use crate::storage::Workspace;
use crate::utils::request::VisitorInfo;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickRequest {
    pub domain: String,
    pub key: String,
    pub url: Option<String>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackClickResponse {
    pub click_id: Option<String>,
}

pub struct TrackService;

impl TrackService {
    pub async fn track_click(
        req: HttpRequest,
        body: web::Json<TrackClickRequest>,
        resolver: web::Data<Arc<LinkResolver>>,
        tracker: web::Data<Arc<ClickTracker>>,
    ) -> Result<HttpResponse> {
        let body = body.into_inner();
        if body.domain.trim().is_empty() || body.key.trim().is_empty() {
            return Err(DubError::bad_request("domain and key are required."));
        }

        let resolved = resolver
            .resolve(&body.domain, &body.key)
            .await?
            .ok_or_else(|| {
                DubError::not_found(format!("Link not found: {}/{}", body.domain, body.key))
            })?;
        let link = resolved.link;

        let url = body
            .url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| link.url.clone());
        let visitor = VisitorInfo::from_request(&req).with_referrer(body.referrer.as_deref());

        let outcome = tracker.track(&link, &url, visitor).await?;
        debug!("Tracked click on {}: {:?}", link.id, outcome);

        Ok(HttpResponse::Ok().json(TrackClickResponse {
            click_id: outcome.click_id().map(String::from),
        }))
    }

    pub async fn track_lead(
        workspace: web::ReqData<Workspace>,
        body: web::Json<TrackLeadRequest>,
        conversions: web::Data<Arc<ConversionService>>,
    ) -> Result<HttpResponse> {
        let response = conversions
            .track_lead(&workspace, body.into_inner())
            .await?;
        Ok(HttpResponse::Ok().json(response))
    }

    pub async fn track_sale(
        workspace: web::ReqData<Workspace>,
        body: web::Json<TrackSaleRequest>,
        conversions: web::Data<Arc<ConversionService>>,
    ) -> Result<HttpResponse> {
        let response = conversions
            .track_sale(&workspace, body.into_inner())
            .await?;
        Ok(HttpResponse::Ok().json(response))
    }
}

/// `/track` 路由配置
pub fn track_routes(authenticator: Arc<WorkspaceAuthenticator>) -> actix_web::Scope {
    web::scope("/track")
        .route("/click", web::post().to(TrackService::track_click))
        .service(
            web::resource("/lead")
                .wrap(WorkspaceAuth::new(authenticator.clone()))
                .route(web::post().to(TrackService::track_lead)),
        )
        .service(
            web::resource("/sale")
                .wrap(WorkspaceAuth::new(authenticator))
                .route(web::post().to(TrackService::track_sale)),
        )
}
