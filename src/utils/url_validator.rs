//! 跳转目标校验：只接受带主机名的 http(s) URL

use url::Url;

use crate::errors::{DubError, Result};

pub fn validate_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(DubError::bad_request("URL cannot be empty"));
    }

    let url = Url::parse(raw).map_err(|e| DubError::bad_request(format!("Invalid URL: {}", e)))?;

    // javascript:、data:、file: 等一律拒绝
    if !matches!(url.scheme(), "http" | "https") {
        return Err(DubError::bad_request(format!(
            "Unsupported URL scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(DubError::bad_request("URL must include a host"));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_http_and_https() {
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("  https://example.com/path?query=1 ").is_ok());
        assert_eq!(
            validate_url("HTTPS://Example.com").unwrap().as_str(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_rejects_other_schemes_and_garbage() {
        for bad in [
            "",
            "   ",
            "javascript:alert(1)",
            "data:text/html,hi",
            "ftp://example.com",
            "file:///etc/passwd",
            "example.com/no-scheme",
        ] {
            let err = validate_url(bad).unwrap_err();
            assert_eq!(err.code(), "bad_request", "{:?}", bad);
        }
    }
}
