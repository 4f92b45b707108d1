// Per-kind retry policies
use std::time::Duration;

use versesync_common::BackoffPolicy;

use super::classify::ErrorKind;

/// Circuit breaker thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircuitBreakerPolicy {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

/// How an error kind is retried
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub circuit_breaker: Option<CircuitBreakerPolicy>,
}

impl RetryPolicy {
    const NEVER: Self =
        Self { max_retries: 0, backoff: BackoffPolicy::none(), circuit_breaker: None };

    pub fn for_kind(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Network => Self {
                max_retries: 3,
                backoff: BackoffPolicy::exponential(
                    Duration::from_millis(1000),
                    Duration::from_millis(10_000),
                ),
                circuit_breaker: Some(CircuitBreakerPolicy {
                    failure_threshold: 5,
                    reset_timeout: Duration::from_secs(30),
                }),
            },
            ErrorKind::Authentication
            | ErrorKind::Authorization
            | ErrorKind::Validation
            | ErrorKind::Client => Self::NEVER,
            ErrorKind::Server => Self {
                max_retries: 3,
                backoff: BackoffPolicy::exponential(
                    Duration::from_millis(2000),
                    Duration::from_millis(20_000),
                ),
                circuit_breaker: None,
            },
            ErrorKind::Timeout => Self {
                max_retries: 2,
                backoff: BackoffPolicy::exponential(
                    Duration::from_millis(500),
                    Duration::from_millis(5000),
                ),
                circuit_breaker: None,
            },
            ErrorKind::Unknown => Self {
                max_retries: 2,
                backoff: BackoffPolicy::exponential(
                    Duration::from_millis(1000),
                    Duration::from_millis(5000),
                ),
                circuit_breaker: None,
            },
        }
    }

    pub fn never_retries(&self) -> bool {
        self.max_retries == 0
    }
}
