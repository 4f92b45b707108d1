//! Realtime change events

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeEventType {
    Insert,
    Update,
    Delete,
}

/// Which change events a subscription wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventFilter {
    #[default]
    #[serde(rename = "*")]
    Any,
    #[serde(rename = "INSERT")]
    Insert,
    #[serde(rename = "UPDATE")]
    Update,
    #[serde(rename = "DELETE")]
    Delete,
}

impl EventFilter {
    pub fn matches(self, event_type: ChangeEventType) -> bool {
        match self {
            Self::Any => true,
            Self::Insert => event_type == ChangeEventType::Insert,
            Self::Update => event_type == ChangeEventType::Update,
            Self::Delete => event_type == ChangeEventType::Delete,
        }
    }
}

/// Row change pushed by the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: String,
    pub event_type: ChangeEventType,
    #[serde(default)]
    pub new: Option<Value>,
    #[serde(default)]
    pub old: Option<Value>,
}

impl ChangeEvent {
    /// User that caused the change: `old.user_id` for deletes,
    /// `new.user_id` otherwise.
    pub fn actor_id(&self) -> Option<&str> {
        let row = match self.event_type {
            ChangeEventType::Delete => self.old.as_ref(),
            ChangeEventType::Insert | ChangeEventType::Update => self.new.as_ref(),
        };
        row.and_then(|r| r.get("user_id")).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn actor_comes_from_old_row_on_delete() {
        let event = ChangeEvent {
            table: "comments".into(),
            event_type: ChangeEventType::Delete,
            new: Some(json!({"user_id": "new-user"})),
            old: Some(json!({"user_id": "old-user"})),
        };
        assert_eq!(event.actor_id(), Some("old-user"));
    }

    #[test]
    fn actor_missing_when_row_has_no_user() {
        let event = ChangeEvent {
            table: "posts".into(),
            event_type: ChangeEventType::Insert,
            new: Some(json!({"id": 1})),
            old: None,
        };
        assert_eq!(event.actor_id(), None);
    }

    #[test]
    fn filter_any_matches_everything() {
        assert!(EventFilter::Any.matches(ChangeEventType::Delete));
        assert!(EventFilter::Insert.matches(ChangeEventType::Insert));
        assert!(!EventFilter::Insert.matches(ChangeEventType::Update));
    }

    #[test]
    fn event_deserializes_wire_shape() {
        let event: ChangeEvent = serde_json::from_value(json!({
            "table": "likes",
            "eventType": "UPDATE",
            "new": {"user_id": "u1"}
        }))
        .unwrap();
        assert_eq!(event.event_type, ChangeEventType::Update);
        assert!(event.old.is_none());
        assert_eq!(event.actor_id(), Some("u1"));
    }
}
