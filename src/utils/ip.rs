//! IP 地址处理工具
//!
//! 统一的客户端 IP 提取：
//! - 连接来自私有地址/localhost 时视为经过反向代理，使用 X-Forwarded-For
//! - 公网直连时使用连接 IP，防止伪造

use std::net::{IpAddr, SocketAddr};

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;
use tracing::debug;

/// 无法确定来源时使用的占位地址
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00 // fc00::/7
                || (v6.segments()[0] & 0xffc0) == 0xfe80 // fe80::/10
        }
    }
}

/// 解析 `ip` 或 `ip:port`
fn parse_peer(peer: &str) -> Option<IpAddr> {
    peer.parse::<SocketAddr>()
        .map(|s| s.ip())
        .or_else(|_| peer.parse::<IpAddr>())
        .ok()
}

/// 从 HeaderMap 提取转发的 IP（X-Forwarded-For 取第一个，其次 X-Real-IP）
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// 根据连接地址和请求头决定客户端 IP
pub fn resolve_client_ip(peer: Option<&str>, headers: &HeaderMap) -> String {
    let Some(peer) = peer else {
        return extract_forwarded_ip_from_headers(headers).unwrap_or_else(|| UNKNOWN_IP.into());
    };

    match parse_peer(peer) {
        Some(ip) if is_private_or_local(&ip) => {
            if let Some(forwarded) = extract_forwarded_ip_from_headers(headers) {
                debug!("Proxy detected ({}), using forwarded IP {}", ip, forwarded);
                return forwarded;
            }
            ip.to_string()
        }
        Some(ip) => ip.to_string(),
        None => peer.to_string(),
    }
}

/// 从 HttpRequest 提取真实客户端 IP
pub fn extract_client_ip(req: &HttpRequest) -> String {
    let conn_info = req.connection_info();
    resolve_client_ip(conn_info.peer_addr(), req.headers())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(HeaderName::from_static(k), HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_is_private_or_local() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_forwarded_ip_used_behind_private_proxy() {
        let h = headers(&[("x-forwarded-for", "203.0.113.7, 10.0.0.2")]);
        assert_eq!(resolve_client_ip(Some("127.0.0.1:5000"), &h), "203.0.113.7");
    }

    #[test]
    fn test_forwarded_ip_ignored_from_public_peer() {
        let h = headers(&[("x-forwarded-for", "1.2.3.4")]);
        assert_eq!(resolve_client_ip(Some("8.8.8.8:443"), &h), "8.8.8.8");
    }

    #[test]
    fn test_real_ip_fallback() {
        let h = headers(&[("x-real-ip", "198.51.100.3")]);
        assert_eq!(resolve_client_ip(Some("10.1.1.1"), &h), "198.51.100.3");
        assert_eq!(resolve_client_ip(None, &HeaderMap::new()), UNKNOWN_IP);
    }
}
