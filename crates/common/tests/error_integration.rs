//! Integration tests for `versesync_common::error`.
//!
//! These suites validate classification, display formatting, and module error
//! delegation through the conversion and classification macros.

use std::time::Duration;

use thiserror::Error;
use versesync_common::error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
use versesync_common::{impl_error_classification, impl_error_conversion};

#[derive(Debug, Error)]
enum QueueError {
    #[error("task {0} is not pending")]
    NotPending(String),

    #[error("queue is shutting down")]
    ShuttingDown,

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl_error_conversion!(QueueError, Common);
impl_error_classification!(QueueError, Common,
    Self::NotPending(_) => {
        retryable: false,
        severity: ErrorSeverity::Low,
        critical: false,
    },
    Self::ShuttingDown => {
        retryable: true,
        severity: ErrorSeverity::Medium,
        critical: false,
        retry_after: Some(Duration::from_secs(1)),
    }
);

fn parse_payload(raw: &str) -> Result<serde_json::Value, QueueError> {
    Ok(serde_json::from_str(raw)?)
}

/// Validates `CommonError` classification for the full variant matrix.
///
/// Assertions:
/// - Only persistence failures are retryable.
/// - Every variant is high severity and none is critical.
#[test]
fn classification_matrix_matches_expected_contract() {
    let cases = vec![
        (CommonError::config("missing storage key"), false),
        (CommonError::serialization_format("JSON", "invalid"), false),
        (CommonError::persistence("disk full"), true),
    ];

    for (err, retryable) in cases {
        assert_eq!(err.is_retryable(), retryable, "retryable mismatch for {err}");
        assert_eq!(err.severity(), ErrorSeverity::High, "severity mismatch for {err}");
        assert!(!err.is_critical(), "critical mismatch for {err}");
        assert_eq!(err.retry_after(), None);
    }
}

#[test]
fn display_includes_optional_context() {
    assert_eq!(
        CommonError::config_field("tick_interval_ms", "must be positive").to_string(),
        "Configuration error in field 'tick_interval_ms': must be positive"
    );
    assert_eq!(
        CommonError::persistence_op("save", "read-only").to_string(),
        "Persistence error during 'save': read-only"
    );
    assert_eq!(
        CommonError::serialization_format("TOML", "expected a table").to_string(),
        "Serialization error (TOML): expected a table"
    );
}

/// Validates the macros for a module error scenario.
///
/// Assertions:
/// - Module variants use their declared classification.
/// - The `Common` variant delegates to `CommonError`.
/// - `serde_json::Error` converts through `CommonError`.
#[test]
fn module_errors_delegate_to_common() {
    let not_pending = QueueError::NotPending("like-1".into());
    assert!(!not_pending.is_retryable());
    assert_eq!(not_pending.severity(), ErrorSeverity::Low);
    assert_eq!(not_pending.retry_after(), None);

    let shutting_down = QueueError::ShuttingDown;
    assert!(shutting_down.is_retryable());
    assert_eq!(shutting_down.retry_after(), Some(Duration::from_secs(1)));

    let delegated = QueueError::from(CommonError::persistence_op("save", "disk full"));
    assert!(delegated.is_retryable());
    assert_eq!(delegated.severity(), ErrorSeverity::High);
    assert_eq!(delegated.retry_after(), None);

    let err = parse_payload("{not json").unwrap_err();
    assert!(matches!(err, QueueError::Common(CommonError::Serialization { ref format, .. })
        if format.as_deref() == Some("JSON")));
}

#[test]
fn io_errors_become_retryable_persistence_errors() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
    let err: CommonResult<()> = Err(io.into());

    let err = err.unwrap_err();
    assert!(matches!(err, CommonError::Persistence { .. }));
    assert!(err.is_retryable());
}

#[test]
fn severity_orders_and_serializes_lowercase() {
    assert!(ErrorSeverity::Low < ErrorSeverity::Medium);
    assert!(ErrorSeverity::High < ErrorSeverity::Critical);
    assert_eq!(serde_json::to_string(&ErrorSeverity::High).unwrap(), "\"high\"");
    assert_eq!(ErrorSeverity::Critical.to_string(), "CRITICAL");
}
