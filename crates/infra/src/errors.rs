//! Infrastructure error type

use thiserror::Error;
use versesync_common::error::{CommonError, ErrorSeverity};
use versesync_common::{impl_error_classification, impl_error_conversion};
use versesync_domain::DomainError;

#[derive(Debug, Error)]
pub enum InfraError {
    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Http(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Common(#[from] CommonError),
}

pub type InfraResult<T> = Result<T, InfraError>;

impl_error_conversion!(InfraError, Common);

impl_error_classification!(InfraError, Common,
    Self::Http(_) => {
        retryable: false,
        severity: ErrorSeverity::High,
        critical: false,
    },
    Self::Domain(_) => {
        retryable: false,
        severity: ErrorSeverity::High,
        critical: false,
    }
);

impl From<reqwest::Error> for InfraError {
    fn from(err: reqwest::Error) -> Self {
        Self::Http(err.to_string())
    }
}
