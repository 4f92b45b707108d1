//! Error types used throughout the domain layer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Domain-level error for VerseSync
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Result type alias for domain operations
pub type Result<T> = std::result::Result<T, DomainError>;

/// Failure reported by a remote collaborator (the remote store or a
/// caller-supplied mutation).
///
/// Carries only what classification needs: an error `name` (type-like tag
/// such as `NetworkError`) and a free-form `message`.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{name}: {message}")]
pub struct RemoteError {
    pub name: String,
    pub message: String,
}

impl RemoteError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }

    /// Error with the generic `Error` name.
    pub fn message(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }
}
