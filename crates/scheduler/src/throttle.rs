use chrono::{DateTime, Utc};

pub const DEFAULT_MAX_ATTEMPTS: i32 = 5;
pub const DEFAULT_RETRY_BASE_SECONDS: i64 = 60;
pub const DEFAULT_RETRY_MAX_SECONDS: i64 = 21_600;

/// The singleton pacing record (`delivery_throttle`, id=1).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DeliveryThrottle {
    pub next_send_at: DateTime<Utc>,
    pub interval_seconds: i64,
    pub max_attempts: i32,
    pub retry_base_seconds: i64,
    pub retry_max_seconds: i64,
}

impl DeliveryThrottle {
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            next_send_at: now,
            interval_seconds: kumo_chrono_helper::HOUR.num_seconds(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_seconds: DEFAULT_RETRY_BASE_SECONDS,
            retry_max_seconds: DEFAULT_RETRY_MAX_SECONDS,
        }
    }

    /// `delay = min(retry_max_seconds, retry_base_seconds * 2^(attempt_count - 1))`.
    ///
    /// `attempt_count` is the count *after* increment, so the first failure
    /// waits `retry_base_seconds`, the second waits twice that, and so on.
    pub fn backoff_seconds(&self, attempt_count: i32) -> i64 {
        debug_assert!(attempt_count >= 1);
        let exponent = (attempt_count - 1).min(62) as u32;
        let scaled = self.retry_base_seconds.saturating_mul(1i64 << exponent);
        scaled.min(self.retry_max_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> DeliveryThrottle {
        DeliveryThrottle {
            next_send_at: Utc::now(),
            interval_seconds: 3600,
            max_attempts: 5,
            retry_base_seconds: 5,
            retry_max_seconds: 60,
        }
    }

    #[test]
    fn backoff_grows_exponentially() {
        let t = throttle();
        assert_eq!(t.backoff_seconds(1), 5);
        assert_eq!(t.backoff_seconds(2), 10);
        assert_eq!(t.backoff_seconds(3), 20);
        assert_eq!(t.backoff_seconds(4), 40);
    }

    #[test]
    fn backoff_is_capped_at_retry_max() {
        let t = throttle();
        assert_eq!(t.backoff_seconds(5), 60);
        assert_eq!(t.backoff_seconds(10), 60);
    }

    #[test]
    fn backoff_does_not_overflow_for_large_attempt_counts() {
        let t = throttle();
        assert_eq!(t.backoff_seconds(1000), 60);
    }
}
