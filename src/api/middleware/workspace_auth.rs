//! Workspace bearer-token authentication
//!
//! `Authorization: Bearer <token>` → SHA-256 → `workspace_tokens.hashed_key`。
//! 命中的 [`Workspace`] 放入 request extensions，handler 用 `web::ReqData<Workspace>` 取。

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{AUTHORIZATION, HeaderMap},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use moka::future::Cache;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{DubError, Result};
use crate::storage::{SeaOrmStorage, Workspace};
use crate::utils::hash_token;

/// 已验证 token 的缓存时长
const TOKEN_CACHE_TTL: Duration = Duration::from_secs(60);
const TOKEN_CACHE_CAPACITY: u64 = 10_000;

/// 从 Authorization header 提取 Bearer token
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// token → workspace，带短期缓存
pub struct WorkspaceAuthenticator {
    storage: Arc<SeaOrmStorage>,
    // key 为 token 的哈希，不缓存明文
    cache: Cache<String, Workspace>,
}

impl WorkspaceAuthenticator {
    pub fn new(storage: Arc<SeaOrmStorage>) -> Self {
        Self::with_ttl(storage, TOKEN_CACHE_TTL)
    }

    pub fn with_ttl(storage: Arc<SeaOrmStorage>, ttl: Duration) -> Self {
        Self {
            storage,
            cache: Cache::builder()
                .max_capacity(TOKEN_CACHE_CAPACITY)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn authenticate(&self, token: &str) -> Result<Workspace> {
        let hashed = hash_token(token);
        if let Some(workspace) = self.cache.get(&hashed).await {
            return Ok(workspace);
        }

        let workspace = self
            .storage
            .find_workspace_by_token_hash(&hashed)
            .await?
            .ok_or_else(|| DubError::unauthorized("Unauthorized: Invalid API key."))?;

        self.cache.insert(hashed, workspace.clone()).await;
        Ok(workspace)
    }
}

/// Workspace authentication middleware
#[derive(Clone)]
pub struct WorkspaceAuth {
    authenticator: Arc<WorkspaceAuthenticator>,
}

impl WorkspaceAuth {
    pub fn new(authenticator: Arc<WorkspaceAuthenticator>) -> Self {
        Self { authenticator }
    }
}

impl<S, B> Transform<S, ServiceRequest> for WorkspaceAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = WorkspaceAuthMiddleware<S>;
    type Future = Ready<std::result::Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(WorkspaceAuthMiddleware {
            service: Rc::new(service),
            authenticator: self.authenticator.clone(),
        }))
    }
}

pub struct WorkspaceAuthMiddleware<S> {
    service: Rc<S>,
    authenticator: Arc<WorkspaceAuthenticator>,
}

impl<S, B> WorkspaceAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    fn reject(req: ServiceRequest, err: DubError) -> ServiceResponse<EitherBody<B>> {
        info!("Workspace authentication failed: {}", err.message());
        req.into_response(err.error_response().map_into_right_body())
    }
}

impl<S, B> Service<ServiceRequest> for WorkspaceAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, std::result::Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let authenticator = self.authenticator.clone();

        Box::pin(async move {
            let Some(token) = extract_bearer_token(req.headers()).map(String::from) else {
                return Ok(Self::reject(
                    req,
                    DubError::unauthorized("Missing Authorization header."),
                ));
            };

            match authenticator.authenticate(&token).await {
                Ok(workspace) => {
                    debug!("Authenticated workspace {}", workspace.id);
                    req.extensions_mut().insert(workspace);
                    let res = srv.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(e) => Ok(Self::reject(req, e)),
            }
        })
    }
}
