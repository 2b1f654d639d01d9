//! 访客元数据提取（地理位置头、User-Agent、Referer）

use actix_web::HttpRequest;
use actix_web::http::header::{self, HeaderMap};
use serde::{Deserialize, Serialize};
use woothee::parser::Parser;

use super::ip::extract_client_ip;

/// 边缘网络注入的地理位置请求头
const COUNTRY_HEADERS: &[&str] = &["x-vercel-ip-country", "cf-ipcountry"];
const CITY_HEADER: &str = "x-vercel-ip-city";
const REGION_HEADER: &str = "x-vercel-ip-country-region";
const CONTINENT_HEADERS: &[&str] = &["x-vercel-ip-continent", "cf-ipcontinent"];

/// 无 Referer 时的来源标记
pub const DIRECT_REFERER: &str = "(direct)";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInfo {
    pub ip: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub continent: Option<String>,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub bot: bool,
    pub user_agent: Option<String>,
    /// Referer 主机名或 `(direct)`
    pub referer: String,
    pub referer_url: Option<String>,
}

/// woothee 解析结果的精简版
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedUserAgent {
    pub device: String,
    pub browser: String,
    pub os: String,
    pub bot: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn first_header(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|name| header_str(headers, name))
        .map(|v| v.to_uppercase())
}

fn known(value: &str) -> String {
    if value.is_empty() || value == "UNKNOWN" {
        "Unknown".to_string()
    } else {
        value.to_string()
    }
}

/// 解析 User-Agent，crawler 类别视为机器人
pub fn parse_user_agent(ua: &str) -> ParsedUserAgent {
    let result = Parser::new().parse(ua).unwrap_or_default();

    let device = match result.category {
        "pc" => "Desktop",
        "smartphone" | "mobilephone" => "Mobile",
        "appliance" => "Appliance",
        "crawler" => "Bot",
        _ => "Unknown",
    };

    ParsedUserAgent {
        device: device.to_string(),
        browser: known(result.name),
        os: known(result.os),
        bot: result.category == "crawler",
    }
}

/// 从 Referer 头得到来源主机名
pub fn referer_host(referer_url: Option<&str>) -> String {
    referer_url
        .and_then(|r| url::Url::parse(r).ok())
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| DIRECT_REFERER.to_string())
}

impl VisitorInfo {
    /// 由客户端 IP 与请求头构造
    pub fn from_parts(ip: String, headers: &HeaderMap) -> Self {
        let user_agent = header_str(headers, header::USER_AGENT.as_str()).map(String::from);
        let parsed = parse_user_agent(user_agent.as_deref().unwrap_or_default());
        let referer_url = header_str(headers, header::REFERER.as_str()).map(String::from);

        Self {
            ip,
            country: first_header(headers, COUNTRY_HEADERS),
            city: header_str(headers, CITY_HEADER)
                .map(|c| urlencoding::decode(c).map(|d| d.into_owned()).unwrap_or_else(|_| c.to_string())),
            region: header_str(headers, REGION_HEADER).map(String::from),
            continent: first_header(headers, CONTINENT_HEADERS),
            device: parsed.device,
            browser: parsed.browser,
            os: parsed.os,
            bot: parsed.bot,
            user_agent,
            referer: referer_host(referer_url.as_deref()),
            referer_url,
        }
    }

    pub fn from_request(req: &HttpRequest) -> Self {
        Self::from_parts(extract_client_ip(req), req.headers())
    }

    /// 用请求体里显式给出的来源覆盖 Referer
    pub fn with_referrer(mut self, referrer: Option<&str>) -> Self {
        if let Some(r) = referrer.filter(|r| !r.trim().is_empty()) {
            self.referer = referer_host(Some(r));
            self.referer_url = Some(r.to_string());
        }
        self
    }

    pub fn is_ios(&self) -> bool {
        matches!(self.os.as_str(), "iPhone" | "iPad" | "iPod" | "iOS")
    }

    pub fn is_android(&self) -> bool {
        self.os == "Android"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::header::{HeaderName, HeaderValue};

    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    #[test]
    fn test_parse_user_agent_desktop() {
        let parsed = parse_user_agent(CHROME);
        assert_eq!(parsed.browser, "Chrome");
        assert_eq!(parsed.device, "Desktop");
        assert!(!parsed.bot);
    }

    #[test]
    fn test_parse_user_agent_crawler_is_bot() {
        let parsed = parse_user_agent(GOOGLEBOT);
        assert!(parsed.bot);
        assert_eq!(parsed.device, "Bot");
    }

    #[test]
    fn test_parse_empty_user_agent() {
        let parsed = parse_user_agent("");
        assert_eq!(parsed.browser, "Unknown");
        assert!(!parsed.bot);
    }

    #[test]
    fn test_referer_host() {
        assert_eq!(referer_host(None), DIRECT_REFERER);
        assert_eq!(referer_host(Some("not a url")), DIRECT_REFERER);
        assert_eq!(
            referer_host(Some("https://www.google.com/search?q=dub")),
            "google.com"
        );
    }

    #[test]
    fn test_visitor_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::USER_AGENT, HeaderValue::from_static(IPHONE));
        headers.insert(
            HeaderName::from_static("x-vercel-ip-country"),
            HeaderValue::from_static("us"),
        );
        headers.insert(
            HeaderName::from_static("x-vercel-ip-city"),
            HeaderValue::from_static("San%20Francisco"),
        );

        let visitor = VisitorInfo::from_parts("203.0.113.9".into(), &headers);
        assert_eq!(visitor.country.as_deref(), Some("US"));
        assert_eq!(visitor.city.as_deref(), Some("San Francisco"));
        assert_eq!(visitor.device, "Mobile");
        assert!(visitor.is_ios());
        assert!(!visitor.is_android());
        assert_eq!(visitor.referer, DIRECT_REFERER);

        let visitor = visitor.with_referrer(Some("https://twitter.com/dubdotco"));
        assert_eq!(visitor.referer, "twitter.com");
    }
}
