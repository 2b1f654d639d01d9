//! 点击追踪限流
//!
//! 按调用方类别分别维护以 IP 为 key 的令牌桶：未认领的演示链接（无 workspace）
//! 额度更严格，已认领链接更宽松。

use std::num::NonZeroU32;

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

use crate::config::{RateLimitConfig, RateLimitRule};
use crate::errors::{DubError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerClass {
    /// 链接不属于任何 workspace
    Demo,
    Claimed,
}

impl CallerClass {
    pub fn for_workspace(workspace_id: Option<&str>) -> Self {
        match workspace_id {
            Some(_) => CallerClass::Claimed,
            None => CallerClass::Demo,
        }
    }
}

pub struct ClickRateLimiter {
    claimed: DefaultKeyedRateLimiter<String>,
    demo: DefaultKeyedRateLimiter<String>,
}

fn quota(rule: RateLimitRule) -> Quota {
    let per_minute = NonZeroU32::new(rule.requests_per_minute).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(rule.burst).unwrap_or(per_minute);
    Quota::per_minute(per_minute).allow_burst(burst)
}

impl ClickRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            claimed: RateLimiter::keyed(quota(config.claimed)),
            demo: RateLimiter::keyed(quota(config.demo)),
        }
    }

    /// 消耗一个令牌；超额时返回 `rate_limit_exceeded`
    pub fn check(&self, class: CallerClass, ip: &str) -> Result<()> {
        let limiter = match class {
            CallerClass::Claimed => &self.claimed,
            CallerClass::Demo => &self.demo,
        };
        limiter.check_key(&ip.to_string()).map_err(|_| {
            debug!("Click rate limit exceeded for {} ({:?})", ip, class);
            DubError::rate_limit_exceeded("Rate limit exceeded")
        })
    }

    /// 清理长时间未使用的 key
    pub fn retain_recent(&self) {
        self.claimed.retain_recent();
        self.demo.retain_recent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(demo_burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            claimed: RateLimitRule {
                requests_per_minute: 600,
                burst: 100,
            },
            demo: RateLimitRule {
                requests_per_minute: 1,
                burst: demo_burst,
            },
        }
    }

    #[test]
    fn test_demo_budget_is_stricter() {
        let limiter = ClickRateLimiter::new(&config(2));

        assert!(limiter.check(CallerClass::Demo, "1.1.1.1").is_ok());
        assert!(limiter.check(CallerClass::Demo, "1.1.1.1").is_ok());
        let err = limiter.check(CallerClass::Demo, "1.1.1.1").unwrap_err();
        assert_eq!(err.code(), "rate_limit_exceeded");

        // 其他 IP 与 claimed 类别不受影响
        assert!(limiter.check(CallerClass::Demo, "2.2.2.2").is_ok());
        for _ in 0..10 {
            assert!(limiter.check(CallerClass::Claimed, "1.1.1.1").is_ok());
        }
    }

    #[test]
    fn test_caller_class() {
        assert_eq!(CallerClass::for_workspace(None), CallerClass::Demo);
        assert_eq!(CallerClass::for_workspace(Some("ws_1")), CallerClass::Claimed);
    }

    #[test]
    fn test_zero_rule_still_allows_one() {
        let limiter = ClickRateLimiter::new(&config(0));
        assert!(limiter.check(CallerClass::Demo, "3.3.3.3").is_ok());
        assert!(limiter.check(CallerClass::Demo, "3.3.3.3").is_err());
    }
}
