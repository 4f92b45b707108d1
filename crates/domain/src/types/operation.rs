//! Sync operations and their payloads

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::{DomainError, Result};
use crate::impl_domain_status_conversions;

/// Tag of a [`SyncOperation`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Like,
    Comment,
    Post,
    Delete,
    Update,
    Refresh,
}

impl_domain_status_conversions!(OperationKind {
    Like => "like",
    Comment => "comment",
    Post => "post",
    Delete => "delete",
    Update => "update",
    Refresh => "refresh",
});

/// Key addressing one entry of the local cache, e.g. `["posts", "42"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    /// Segments joined with `-`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("-"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikePayload {
    pub post_id: String,
    pub liked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPayload {
    pub post_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    /// Scripture reference the post discusses, e.g. `"John 3:16"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePayload {
    pub table: String,
    pub record_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub table: String,
    pub record_id: String,
    pub changes: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub cache_keys: Vec<CacheKey>,
}

/// Unit of remote work, one variant per operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "payload", rename_all = "snake_case")]
pub enum SyncOperation {
    Like(LikePayload),
    Comment(CommentPayload),
    Post(PostPayload),
    Delete(DeletePayload),
    Update(UpdatePayload),
    Refresh(RefreshPayload),
}

impl SyncOperation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Like(_) => OperationKind::Like,
            Self::Comment(_) => OperationKind::Comment,
            Self::Post(_) => OperationKind::Post,
            Self::Delete(_) => OperationKind::Delete,
            Self::Update(_) => OperationKind::Update,
            Self::Refresh(_) => OperationKind::Refresh,
        }
    }

    /// Payload as a bare JSON value (the persisted `payload` field).
    ///
    /// # Errors
    /// Fails only if a payload holds a non-serializable value.
    pub fn payload_json(&self) -> serde_json::Result<Value> {
        match self {
            Self::Like(p) => serde_json::to_value(p),
            Self::Comment(p) => serde_json::to_value(p),
            Self::Post(p) => serde_json::to_value(p),
            Self::Delete(p) => serde_json::to_value(p),
            Self::Update(p) => serde_json::to_value(p),
            Self::Refresh(p) => serde_json::to_value(p),
        }
    }

    /// Rebuild an operation from its persisted tag and payload.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidInput` when the payload does not match
    /// the shape the tag requires.
    pub fn from_parts(kind: OperationKind, payload: Value) -> Result<Self> {
        serde_json::from_value(json!({ "operation": kind, "payload": payload })).map_err(|e| {
            DomainError::InvalidInput(format!("malformed {kind} payload: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_serializes_adjacently_tagged() {
        let op = SyncOperation::Like(LikePayload { post_id: "p1".into(), liked: true });
        let value = serde_json::to_value(&op).unwrap();
        assert_eq!(
            value,
            json!({"operation": "like", "payload": {"post_id": "p1", "liked": true}})
        );
    }

    #[test]
    fn from_parts_rebuilds_payload() {
        let op = SyncOperation::Refresh(RefreshPayload {
            cache_keys: vec![CacheKey::new(["posts"]), CacheKey::new(["comments", "p1"])],
        });
        let rebuilt = SyncOperation::from_parts(op.kind(), op.payload_json().unwrap()).unwrap();
        assert_eq!(rebuilt, op);
    }

    #[test]
    fn from_parts_rejects_mismatched_payload() {
        let err = SyncOperation::from_parts(OperationKind::Delete, json!({"post_id": "p1"}))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidInput(msg) if msg.contains("delete")));
    }

    #[test]
    fn cache_key_joins_with_dash() {
        assert_eq!(CacheKey::new(["posts", "42", "likes"]).to_string(), "posts-42-likes");
    }
}
