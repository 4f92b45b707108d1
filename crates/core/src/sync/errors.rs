//! Error types for the sync engine

use thiserror::Error;
use versesync_common::error::{CommonError, ErrorSeverity};
use versesync_common::{impl_error_classification, impl_error_conversion};
use versesync_domain::{DomainError, TaskId};

use super::error_handler::ProcessedError;

/// Errors surfaced by the sync engine
#[derive(Debug, Error)]
pub enum SyncError {
    /// Pending task cancelled before it ran
    #[error("Task {task_id} was cancelled")]
    Cancelled { task_id: TaskId },

    /// Task dropped because the queue was cleared
    #[error("Task {task_id} was dropped when the queue was cleared")]
    QueueCleared { task_id: TaskId },

    /// Engine is being torn down
    #[error("Sync engine is shutting down")]
    ShuttingDown,

    /// Completion handle dropped without a result
    #[error("Task {task_id} was abandoned before completion")]
    Abandoned { task_id: TaskId },

    /// Task id is neither pending nor in flight
    #[error("Unknown task: {0}")]
    UnknownTask(TaskId),

    /// Remote failure after classification
    #[error(transparent)]
    Remote(Box<ProcessedError>),

    /// Batch executor failed for part of the batch
    #[error("Batch flush failed for {failed} of {total} tasks")]
    BatchFailed { failed: usize, total: usize },

    /// Realtime channel could not be opened
    #[error("Realtime channel '{channel}' failed: {message}")]
    Realtime { channel: String, message: String },

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl From<ProcessedError> for SyncError {
    fn from(err: ProcessedError) -> Self {
        Self::Remote(Box::new(err))
    }
}

impl SyncError {
    /// Classified remote failure, if this is one
    pub fn as_processed(&self) -> Option<&ProcessedError> {
        match self {
            Self::Remote(e) => Some(e),
            _ => None,
        }
    }
}

impl_error_conversion!(SyncError, Common);

impl_error_classification!(SyncError, Common,
    Self::Cancelled { .. } | Self::QueueCleared { .. } | Self::Abandoned { .. } => {
        retryable: false,
        severity: ErrorSeverity::Low,
        critical: false,
    },
    Self::ShuttingDown => {
        retryable: false,
        severity: ErrorSeverity::Low,
        critical: false,
    },
    Self::UnknownTask(_) => {
        retryable: false,
        severity: ErrorSeverity::Low,
        critical: false,
    },
    Self::Remote(e) => {
        retryable: e.retryable,
        severity: e.severity,
        critical: e.severity == ErrorSeverity::Critical,
    },
    Self::BatchFailed { .. } => {
        retryable: false,
        severity: ErrorSeverity::Medium,
        critical: false,
    },
    Self::Realtime { .. } => {
        retryable: true,
        severity: ErrorSeverity::Medium,
        critical: false,
    },
    Self::Domain(_) => {
        retryable: false,
        severity: ErrorSeverity::Low,
        critical: false,
    },
);

/// Result alias for sync engine operations
pub type SyncResult<T> = Result<T, SyncError>;
