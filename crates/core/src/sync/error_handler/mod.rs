//! Centralized failure handling: classification, retry decisions, circuit
//! breakers and user notification.
//!
//! Every remote failure goes through [`ErrorHandler::process_error`], which
//! turns a raw [`RemoteError`] into a [`ProcessedError`] carrying its kind,
//! severity, localized user message and retry verdict. Retry policies are
//! fixed per [`ErrorKind`]; kinds with a circuit breaker stop retrying a given
//! operation after repeated failures until the reset timeout has passed.

mod classify;
mod messages;
mod policy;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use versesync_common::{Clock, ErrorSeverity};
use versesync_domain::constants::{
    NOTIFY_ERROR_DURATION_MS, NOTIFY_INFO_DURATION_MS, NOTIFY_WARNING_DURATION_MS,
};
use versesync_domain::{Locale, RemoteError};

pub use self::classify::{classify, ErrorKind};
pub use self::messages::user_message;
pub use self::policy::{CircuitBreakerPolicy, RetryPolicy};
use super::ports::{NotificationLevel, Notifier};

/// Where a failure happened
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorContext {
    /// Operation name, also the circuit breaker key
    pub operation: String,
    pub payload: Option<Value>,
    /// Retries already spent; `None` when the caller does not track attempts
    pub retry_count: Option<u32>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self { operation: operation.into(), payload: None, retry_count: None }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }
}

/// Classified failure
#[derive(Debug, Clone)]
pub struct ProcessedError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub user_message: String,
    pub retryable: bool,
    pub source: RemoteError,
    pub context: ErrorContext,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for ProcessedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error during '{}': {}", self.kind, self.context.operation, self.message)
    }
}

impl std::error::Error for ProcessedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Consecutive failures recorded for one (kind, operation) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerRecord {
    pub failures: u32,
    pub last_failure: Instant,
}

/// Processed-error count per kind
pub type ErrorStats = BTreeMap<ErrorKind, u64>;

type BreakerKey = (ErrorKind, String);

pub struct ErrorHandler {
    clock: Arc<dyn Clock>,
    notifier: Option<Arc<dyn Notifier>>,
    locale: Locale,
    notifications_enabled: AtomicBool,
    breakers: Mutex<HashMap<BreakerKey, CircuitBreakerRecord>>,
    counts: Mutex<HashMap<ErrorKind, u64>>,
}

impl ErrorHandler {
    pub fn new(clock: Arc<dyn Clock>, locale: Locale) -> Self {
        Self {
            clock,
            notifier: None,
            locale,
            notifications_enabled: AtomicBool::new(true),
            breakers: Mutex::new(HashMap::new()),
            counts: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    /// Classify, log and count a failure.
    pub fn process_error(&self, error: &RemoteError, context: ErrorContext) -> ProcessedError {
        let kind = classify(&error.name, &error.message);
        let severity = kind.severity();
        let retryable = self.is_retryable(kind, &context);

        let processed = ProcessedError {
            kind,
            severity,
            message: error.message.clone(),
            user_message: user_message(kind, self.locale).to_string(),
            retryable,
            source: error.clone(),
            context,
            timestamp: DateTime::<Utc>::from(self.clock.system_time()),
        };

        self.log(&processed);
        *self.counts.lock().entry(kind).or_insert(0) += 1;

        processed
    }

    /// Whether another attempt is allowed for `kind` in `context`.
    ///
    /// False when the kind never retries or its breaker for the operation
    /// is open. An open breaker past its reset timeout is discarded; records
    /// below the threshold are kept. When the context carries a
    /// retry count, the kind's retry budget applies.
    pub fn is_retryable(&self, kind: ErrorKind, context: &ErrorContext) -> bool {
        let policy = RetryPolicy::for_kind(kind);
        if policy.never_retries() {
            return false;
        }

        if let Some(breaker) = policy.circuit_breaker {
            let key = (kind, context.operation.clone());
            let mut breakers = self.breakers.lock();
            if let Some(record) = breakers.get(&key) {
                if record.failures >= breaker.failure_threshold {
                    let since_last =
                        self.clock.now().saturating_duration_since(record.last_failure);
                    if since_last < breaker.reset_timeout {
                        warn!(
                            error_kind = %kind,
                            operation = %context.operation,
                            failures = record.failures,
                            "Circuit breaker open, refusing retry"
                        );
                        return false;
                    }
                    debug!(
                        error_kind = %kind,
                        operation = %context.operation,
                        "Circuit breaker reset"
                    );
                    breakers.remove(&key);
                }
            }
        }

        match context.retry_count {
            Some(retry_count) => retry_count < policy.max_retries,
            None => true,
        }
    }

    /// Backoff before retry number `retry_count`
    pub fn calculate_retry_delay(&self, kind: ErrorKind, retry_count: u32) -> Duration {
        RetryPolicy::for_kind(kind).backoff.delay_for(retry_count)
    }

    /// Count a failure against the (kind, operation) breaker.
    pub fn record_failure(&self, kind: ErrorKind, context: &ErrorContext) {
        if RetryPolicy::for_kind(kind).circuit_breaker.is_none() {
            return;
        }

        let now = self.clock.now();
        let mut breakers = self.breakers.lock();
        let record = breakers
            .entry((kind, context.operation.clone()))
            .or_insert(CircuitBreakerRecord { failures: 0, last_failure: now });
        record.failures += 1;
        record.last_failure = now;

        debug!(
            error_kind = %kind,
            operation = %context.operation,
            failures = record.failures,
            "Circuit breaker failure recorded"
        );
    }

    /// Clear every breaker recorded for `operation`.
    pub fn record_success(&self, operation: &str) {
        self.breakers.lock().retain(|(_, op), _| op != operation);
    }

    /// Current breaker record, if any
    pub fn breaker(&self, kind: ErrorKind, operation: &str) -> Option<CircuitBreakerRecord> {
        self.breakers.lock().get(&(kind, operation.to_string())).copied()
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.notifications_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled.load(Ordering::Relaxed)
    }

    /// Surface the error's user message. Returns whether a notification
    /// was sent.
    pub fn show_notification(&self, error: &ProcessedError) -> bool {
        if !self.notifications_enabled() {
            return false;
        }
        let Some(notifier) = &self.notifier else {
            return false;
        };

        let (level, millis) = match error.severity {
            ErrorSeverity::High | ErrorSeverity::Critical => {
                (NotificationLevel::Error, NOTIFY_ERROR_DURATION_MS)
            }
            ErrorSeverity::Medium => (NotificationLevel::Warning, NOTIFY_WARNING_DURATION_MS),
            ErrorSeverity::Low => (NotificationLevel::Info, NOTIFY_INFO_DURATION_MS),
        };
        notifier.notify(level, &error.user_message, Duration::from_millis(millis));
        true
    }

    /// Processed-error counts for every kind, zero-filled
    pub fn error_stats(&self) -> ErrorStats {
        let counts = self.counts.lock();
        ErrorKind::ALL
            .into_iter()
            .map(|kind| (kind, counts.get(&kind).copied().unwrap_or(0)))
            .collect()
    }

    /// Drop all breakers and counters
    pub fn reset(&self) {
        self.breakers.lock().clear();
        self.counts.lock().clear();
        info!("Error handler state reset");
    }

    fn log(&self, err: &ProcessedError) {
        let ctx = &err.context;
        match err.severity {
            ErrorSeverity::High | ErrorSeverity::Critical => error!(
                error_kind = %err.kind,
                severity = %err.severity,
                operation = %ctx.operation,
                retry_count = ?ctx.retry_count,
                retryable = err.retryable,
                payload = ?ctx.payload,
                "{}",
                err.message
            ),
            ErrorSeverity::Medium => warn!(
                error_kind = %err.kind,
                severity = %err.severity,
                operation = %ctx.operation,
                retry_count = ?ctx.retry_count,
                retryable = err.retryable,
                payload = ?ctx.payload,
                "{}",
                err.message
            ),
            ErrorSeverity::Low => info!(
                error_kind = %err.kind,
                severity = %err.severity,
                operation = %ctx.operation,
                retry_count = ?ctx.retry_count,
                retryable = err.retryable,
                payload = ?ctx.payload,
                "{}",
                err.message
            ),
        }
    }
}
