//! Serialization utilities for common data types

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serializer};

/// Serde helper storing a `Duration` as whole milliseconds (u64).
///
/// ```rust
/// use std::time::Duration;
///
/// use serde::{Deserialize, Serialize};
/// use versesync_common::utils::duration_millis;
///
/// #[derive(Serialize, Deserialize)]
/// struct Window {
///     #[serde(with = "duration_millis")]
///     max_wait: Duration,
/// }
///
/// let json = serde_json::to_string(&Window { max_wait: Duration::from_secs(1) }).unwrap();
/// assert_eq!(json, r#"{"max_wait":1000}"#);
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use crate::backoff::BackoffPolicy;

    /// Validates `duration_millis` through the backoff policy's serde form.
    ///
    /// Assertions:
    /// - Confirms delays are written as integer milliseconds.
    /// - Confirms the policy reads back unchanged.
    #[test]
    fn test_backoff_policy_serializes_millis() {
        let policy = BackoffPolicy::exponential(
            std::time::Duration::from_millis(500),
            std::time::Duration::from_secs(5),
        );

        let json = serde_json::to_value(policy).unwrap();
        assert_eq!(json["base_delay"], 500);
        assert_eq!(json["max_delay"], 5000);

        let back: BackoffPolicy = serde_json::from_value(json).unwrap();
        assert_eq!(back, policy);
    }

    #[test]
    fn test_duration_millis_rejects_strings() {
        let result: Result<BackoffPolicy, _> = serde_json::from_str(
            r#"{"base_delay":"soon","max_delay":10,"exponential":true,"jitter_factor":0.3}"#,
        );
        assert!(result.is_err());
    }
}
