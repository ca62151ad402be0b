//! Retry logic with exponential backoff and jitter.
//!
//! Retries are a connector concern: adapters wrap their transport calls with
//! [`RetryConfig`], the aggregator and optimizer never retry.

use std::time::Duration;

use crate::http_client::{HttpError, HttpErrorKind};

/// Backoff strategy between retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed {
        delay: Duration,
    },
    /// `base * factor^attempt`, capped at `max`, optionally with +/- 50% jitter.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64());

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Connector retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether another attempt is allowed after `attempt` failed ones.
    pub fn can_retry(&self, attempt: u32) -> bool {
        self.enabled && attempt < self.max_retries
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    pub fn should_retry_error(&self, error: &HttpError) -> bool {
        match error.kind() {
            HttpErrorKind::Timeout => self.retry_on_timeout,
            HttpErrorKind::Connect => self.retry_on_connect,
            HttpErrorKind::Other => false,
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay(attempt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1)); // capped
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();

        assert!(config.can_retry(0));
        assert!(!config.can_retry(3));
        assert!(config.should_retry_status(429));
        assert!(config.should_retry_status(503));
        assert!(!config.should_retry_status(400));
        assert!(config.should_retry_error(&HttpError::timeout("slow")));
        assert!(config.should_retry_error(&HttpError::connect("refused")));
        assert!(!config.should_retry_error(&HttpError::other("tls")));
    }

    #[test]
    fn test_retry_config_no_retry() {
        let config = RetryConfig::no_retry();

        assert!(!config.enabled);
        assert!(!config.can_retry(0));
    }

    #[test]
    fn test_retry_config_fixed() {
        let config = RetryConfig::fixed(Duration::from_millis(500), 2);

        assert!(config.can_retry(1));
        assert!(!config.can_retry(2));
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(500));
    }
}
