use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

const DOC_BASE_URL: &str = "https://dub.co/docs/api-reference/errors";

#[derive(Debug, Clone)]
pub enum DubError {
    // API 错误（映射到对外的错误码）
    NotFound(String),
    RateLimitExceeded(String),
    Conflict(String),
    Forbidden(String),
    BadRequest(String),
    Unauthorized(String),
    UnprocessableEntity(String),
    // 基础设施错误
    DatabaseConfig(String),
    DatabaseConnection(String),
    DatabaseOperation(String),
    CacheConnection(String),
    CachePluginNotFound(String),
    Serialization(String),
    Internal(String),
}

impl DubError {
    /// 对外错误码（snake_case）
    pub fn code(&self) -> &'static str {
        match self {
            DubError::NotFound(_) => "not_found",
            DubError::RateLimitExceeded(_) => "rate_limit_exceeded",
            DubError::Conflict(_) => "conflict",
            DubError::Forbidden(_) => "forbidden",
            DubError::BadRequest(_) => "bad_request",
            DubError::Unauthorized(_) => "unauthorized",
            DubError::UnprocessableEntity(_) => "unprocessable_entity",
            DubError::DatabaseConfig(_)
            | DubError::DatabaseConnection(_)
            | DubError::DatabaseOperation(_)
            | DubError::CacheConnection(_)
            | DubError::CachePluginNotFound(_)
            | DubError::Serialization(_)
            | DubError::Internal(_) => "internal_server_error",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            DubError::NotFound(_) => "Resource Not Found",
            DubError::RateLimitExceeded(_) => "Rate Limit Exceeded",
            DubError::Conflict(_) => "Conflict",
            DubError::Forbidden(_) => "Forbidden",
            DubError::BadRequest(_) => "Bad Request",
            DubError::Unauthorized(_) => "Unauthorized",
            DubError::UnprocessableEntity(_) => "Unprocessable Entity",
            DubError::DatabaseConfig(_) => "Database Configuration Error",
            DubError::DatabaseConnection(_) => "Database Connection Error",
            DubError::DatabaseOperation(_) => "Database Operation Error",
            DubError::CacheConnection(_) => "Cache Connection Error",
            DubError::CachePluginNotFound(_) => "Cache Plugin Not Found",
            DubError::Serialization(_) => "Serialization Error",
            DubError::Internal(_) => "Internal Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            DubError::NotFound(msg)
            | DubError::RateLimitExceeded(msg)
            | DubError::Conflict(msg)
            | DubError::Forbidden(msg)
            | DubError::BadRequest(msg)
            | DubError::Unauthorized(msg)
            | DubError::UnprocessableEntity(msg)
            | DubError::DatabaseConfig(msg)
            | DubError::DatabaseConnection(msg)
            | DubError::DatabaseOperation(msg)
            | DubError::CacheConnection(msg)
            | DubError::CachePluginNotFound(msg)
            | DubError::Serialization(msg)
            | DubError::Internal(msg) => msg,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            DubError::NotFound(_) => StatusCode::NOT_FOUND,
            DubError::RateLimitExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            DubError::Conflict(_) => StatusCode::CONFLICT,
            DubError::Forbidden(_) => StatusCode::FORBIDDEN,
            DubError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DubError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DubError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 文档链接，例如 `.../errors#rate-limit-exceeded`
    pub fn doc_url(&self) -> String {
        format!("{}#{}", DOC_BASE_URL, self.code().replace('_', "-"))
    }

    /// 是否为客户端可见的业务错误
    pub fn is_client_error(&self) -> bool {
        self.http_status().is_client_error()
    }

    /// 格式化为彩色输出（用于 CLI 模式）
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for DubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for DubError {}

// 便捷的构造函数
impl DubError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        DubError::NotFound(msg.into())
    }

    pub fn rate_limit_exceeded<T: Into<String>>(msg: T) -> Self {
        DubError::RateLimitExceeded(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        DubError::Conflict(msg.into())
    }

    pub fn forbidden<T: Into<String>>(msg: T) -> Self {
        DubError::Forbidden(msg.into())
    }

    pub fn bad_request<T: Into<String>>(msg: T) -> Self {
        DubError::BadRequest(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        DubError::Unauthorized(msg.into())
    }

    pub fn unprocessable_entity<T: Into<String>>(msg: T) -> Self {
        DubError::UnprocessableEntity(msg.into())
    }

    pub fn database_config<T: Into<String>>(msg: T) -> Self {
        DubError::DatabaseConfig(msg.into())
    }

    pub fn database_connection<T: Into<String>>(msg: T) -> Self {
        DubError::DatabaseConnection(msg.into())
    }

    pub fn database_operation<T: Into<String>>(msg: T) -> Self {
        DubError::DatabaseOperation(msg.into())
    }

    pub fn cache_connection<T: Into<String>>(msg: T) -> Self {
        DubError::CacheConnection(msg.into())
    }

    pub fn cache_plugin_not_found<T: Into<String>>(msg: T) -> Self {
        DubError::CachePluginNotFound(msg.into())
    }

    pub fn serialization<T: Into<String>>(msg: T) -> Self {
        DubError::Serialization(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        DubError::Internal(msg.into())
    }
}

/// HTTP 错误响应体
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail<'a> {
    pub code: &'a str,
    pub message: &'a str,
    pub doc_url: String,
}

impl ResponseError for DubError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        // 基础设施错误不向外暴露细节
        let message = if self.is_client_error() {
            self.message()
        } else {
            "An internal server error occurred."
        };
        HttpResponse::build(self.http_status()).json(ErrorBody {
            error: ErrorDetail {
                code: self.code(),
                message,
                doc_url: self.doc_url(),
            },
        })
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for DubError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err.sql_err() {
            Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) => {
                DubError::Conflict(format!("Unique constraint violation: {}", detail))
            }
            _ => DubError::DatabaseOperation(err.to_string()),
        }
    }
}

impl From<std::io::Error> for DubError {
    fn from(err: std::io::Error) -> Self {
        DubError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for DubError {
    fn from(err: serde_json::Error) -> Self {
        DubError::Serialization(err.to_string())
    }
}

impl From<redis::RedisError> for DubError {
    fn from(err: redis::RedisError) -> Self {
        DubError::CacheConnection(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_status() {
        let cases = [
            (DubError::not_found("x"), "not_found", 404),
            (DubError::rate_limit_exceeded("x"), "rate_limit_exceeded", 429),
            (DubError::conflict("x"), "conflict", 409),
            (DubError::forbidden("x"), "forbidden", 403),
            (DubError::bad_request("x"), "bad_request", 400),
            (DubError::unauthorized("x"), "unauthorized", 401),
            (DubError::unprocessable_entity("x"), "unprocessable_entity", 422),
            (DubError::internal("x"), "internal_server_error", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.http_status().as_u16(), status);
        }
    }

    #[test]
    fn test_doc_url_uses_kebab_case() {
        let err = DubError::rate_limit_exceeded("slow down");
        assert_eq!(
            err.doc_url(),
            "https://dub.co/docs/api-reference/errors#rate-limit-exceeded"
        );
    }

    #[test]
    fn test_db_error_maps_to_operation() {
        let err: DubError = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(matches!(err, DubError::DatabaseOperation(_)));
        assert_eq!(err.code(), "internal_server_error");
    }

    #[test]
    fn test_format_simple() {
        let err = DubError::not_found("Click not found");
        assert_eq!(err.format_simple(), "Resource Not Found: Click not found");
        assert_eq!(err.to_string(), err.format_simple());
    }
}
