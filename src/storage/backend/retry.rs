//! 瞬时错误重试
//!
//! 连接获取失败、连接中断、死锁、锁超时、SQLite BUSY 视为瞬时错误，
//! 其余错误直接返回。退避参数与后台任务队列共用 [`Backoff`]。

use std::future::Future;
use std::time::Duration;

use sea_orm::DbErr;
use sea_orm::error::RuntimeErr;
use tracing::{debug, warn};

use crate::config::DatabaseConfig;

/// MySQL 1213/1205，PostgreSQL 40001/40P01，SQLite BUSY(5)/LOCKED(6)
const TRANSIENT_CODES: &[&str] = &["1213", "1205", "40001", "40P01", "5", "6"];

/// 拿不到错误码时按消息匹配
const TRANSIENT_MESSAGES: &[&str] = &[
    "deadlock",
    "lock wait timeout",
    "database is locked",
    "serialization failure",
];

/// 指数退避：第 n 次重试前等待 `base × 2^(n-1)`，封顶 `cap`，再加至多 1/4 抖动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub cap_ms: u64,
}

impl Backoff {
    pub const fn new(base_ms: u64, cap_ms: u64) -> Self {
        Self { base_ms, cap_ms }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let capped = self.base_ms.saturating_mul(1u64 << shift).min(self.cap_ms);
        let jitter = rand::random_range(0..=capped / 4);
        Duration::from_millis(capped.saturating_add(jitter))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// 首次执行之外的最多重试次数
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl From<&DatabaseConfig> for RetryPolicy {
    fn from(config: &DatabaseConfig) -> Self {
        Self {
            max_retries: config.retry_count,
            backoff: Backoff::new(config.retry_base_delay_ms, config.retry_max_delay_ms),
        }
    }
}

pub fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(inner) | DbErr::Query(inner) => runtime_is_transient(inner),
        _ => false,
    }
}

fn runtime_is_transient(err: &RuntimeErr) -> bool {
    let message = match err {
        RuntimeErr::SqlxError(sqlx_err) => {
            if let Some(code) = sqlx_err.as_database_error().and_then(|db| db.code()) {
                return TRANSIENT_CODES.iter().any(|c| code == *c);
            }
            sqlx_err.to_string()
        }
        RuntimeErr::Internal(msg) => msg.clone(),
        #[allow(unreachable_patterns)]
        _ => return false,
    };
    let lower = message.to_lowercase();
    TRANSIENT_MESSAGES.iter().any(|m| lower.contains(m))
}

/// 执行 `operation`，瞬时错误按 `policy` 重试
pub async fn retry_transient<T, F, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let mut retries = 0;
    loop {
        let err = match operation().await {
            Ok(value) => {
                if retries > 0 {
                    debug!("{} succeeded after {} retries", operation_name, retries);
                }
                return Ok(value);
            }
            Err(e) => e,
        };

        if retries >= policy.max_retries || !is_transient(&err) {
            return Err(err);
        }

        retries += 1;
        let delay = policy.backoff.delay(retries);
        warn!(
            "{} hit a transient database error ({}), retry {}/{} in {:?}",
            operation_name, err, retries, policy.max_retries, delay
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::error::ConnAcquireErr;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            backoff: Backoff::new(1, 5),
        }
    }

    #[test]
    fn test_transient_classification() {
        assert!(is_transient(&DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)));
        assert!(is_transient(&DbErr::Exec(RuntimeErr::Internal(
            "Deadlock found when trying to get lock".to_string()
        ))));
        assert!(is_transient(&DbErr::Query(RuntimeErr::Internal(
            "database is locked".to_string()
        ))));
        assert!(!is_transient(&DbErr::RecordNotFound("link".to_string())));
        assert!(!is_transient(&DbErr::Exec(RuntimeErr::Internal(
            "UNIQUE constraint failed: links.domain, links.key".to_string()
        ))));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let b = Backoff::new(100, 1000);
        let ms = |n| b.delay(n).as_millis() as u64;
        assert!((100..=125).contains(&ms(1)));
        assert!((400..=500).contains(&ms(3)));
        assert!((1000..=1250).contains(&ms(10)));
        // 极大的重试次数不溢出
        assert!((1000..=1250).contains(&ms(u32::MAX)));
    }

    #[test]
    fn test_policy_from_database_config() {
        let policy = RetryPolicy::from(&DatabaseConfig {
            retry_count: 7,
            retry_base_delay_ms: 5,
            retry_max_delay_ms: 40,
            ..DatabaseConfig::default()
        });
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.backoff, Backoff::new(5, 40));
    }

    #[tokio::test]
    async fn test_transient_error_is_retried_until_success() {
        let calls = AtomicU32::new(0);
        let result = retry_transient("flaky", fast(3), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout))
                } else {
                    Ok("link_1")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "link_1");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient("down", fast(2), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::ConnectionAcquire(ConnAcquireErr::Timeout)) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient("missing", fast(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DbErr::RecordNotFound("link".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
