use std::sync::Arc;

use actix_web::{HttpResponse, web};

use crate::errors::Result;
use crate::services::LinkResolver;

pub struct ShareService;

impl ShareService {
    /// 公开统计；未开启 public_stats 时 403
    pub async fn public_stats(
        path: web::Path<(String, String)>,
        resolver: web::Data<Arc<LinkResolver>>,
    ) -> Result<HttpResponse> {
        let (domain, key) = path.into_inner();
        let stats = resolver.public_stats(&domain, &key).await?;
        Ok(HttpResponse::Ok().json(stats))
    }
}

pub fn share_routes() -> actix_web::Scope {
    web::scope("/share").route(
        "/{domain}/{key:.*}",
        web::get().to(ShareService::public_stats),
    )
}
