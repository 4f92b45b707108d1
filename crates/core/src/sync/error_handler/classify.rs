//! Keyword-based error classification

use serde::{Deserialize, Serialize};
use versesync_common::ErrorSeverity;
use versesync_domain::impl_domain_status_conversions;

/// Failure category driving severity, retry policy and user message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Authentication,
    Authorization,
    Validation,
    Server,
    Client,
    Timeout,
    Unknown,
}

impl_domain_status_conversions!(ErrorKind {
    Network => "network",
    Authentication => "authentication",
    Authorization => "authorization",
    Validation => "validation",
    Server => "server",
    Client => "client",
    Timeout => "timeout",
    Unknown => "unknown",
});

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::Network,
        ErrorKind::Authentication,
        ErrorKind::Authorization,
        ErrorKind::Validation,
        ErrorKind::Server,
        ErrorKind::Client,
        ErrorKind::Timeout,
        ErrorKind::Unknown,
    ];

    pub fn severity(self) -> ErrorSeverity {
        match self {
            Self::Authentication | Self::Authorization | Self::Server => ErrorSeverity::High,
            Self::Network | Self::Timeout => ErrorSeverity::Medium,
            Self::Validation => ErrorSeverity::Low,
            Self::Client | Self::Unknown => ErrorSeverity::Medium,
        }
    }
}

const NETWORK_KEYWORDS: &[&str] = &["network", "fetch", "connection", "offline"];
const NETWORK_NAMES: &[&str] = &["networkerror", "typeerror"];
const AUTH_KEYWORDS: &[&str] = &["auth", "unauthorized", "401", "token", "login"];
const AUTHZ_KEYWORDS: &[&str] = &["forbidden", "403", "permission", "access denied"];
const SERVER_KEYWORDS: &[&str] = &["500", "server error", "internal error", "database"];
const TIMEOUT_KEYWORDS: &[&str] = &["timeout", "timed out"];
const VALIDATION_KEYWORDS: &[&str] = &["validation", "invalid", "400", "bad request"];
const CLIENT_KEYWORDS: &[&str] = &["client error", "4xx"];

/// Classify a failure by its error `name` and `message`.
///
/// Rules are checked in order (network, authentication, authorization,
/// server, timeout, validation, client) against the lowercased message;
/// network also matches on the name. Anything else is `Unknown`.
pub fn classify(name: &str, message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    let name = name.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| message.contains(k));

    if mentions(NETWORK_KEYWORDS) || NETWORK_NAMES.contains(&name.as_str()) {
        ErrorKind::Network
    } else if mentions(AUTH_KEYWORDS) {
        ErrorKind::Authentication
    } else if mentions(AUTHZ_KEYWORDS) {
        ErrorKind::Authorization
    } else if mentions(SERVER_KEYWORDS) {
        ErrorKind::Server
    } else if mentions(TIMEOUT_KEYWORDS) {
        ErrorKind::Timeout
    } else if mentions(VALIDATION_KEYWORDS) {
        ErrorKind::Validation
    } else if mentions(CLIENT_KEYWORDS) {
        ErrorKind::Client
    } else {
        ErrorKind::Unknown
    }
}
