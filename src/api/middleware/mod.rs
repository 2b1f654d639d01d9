pub mod request_id;
pub mod workspace_auth;

pub use request_id::{RequestId, RequestIdMiddleware};
pub use workspace_auth::{WorkspaceAuth, WorkspaceAuthenticator, extract_bearer_token};
