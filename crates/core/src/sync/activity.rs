//! Bounded in-memory log of engine activity, queryable by the UI

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use versesync_common::Clock;

pub const DEFAULT_ACTIVITY_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl ActivityLevel {
    pub const ALL: [ActivityLevel; 4] =
        [ActivityLevel::Debug, ActivityLevel::Info, ActivityLevel::Warn, ActivityLevel::Error];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub level: ActivityLevel,
    /// Component that recorded the entry, e.g. `"SyncManager"`
    pub component: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Filter for [`ActivityLog::entries`]; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityQuery {
    pub level: Option<ActivityLevel>,
    pub component: Option<String>,
    /// Keep only the newest `limit` matches
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityStats {
    pub total: usize,
    pub by_level: BTreeMap<ActivityLevel, usize>,
    pub by_component: BTreeMap<String, usize>,
}

pub struct ActivityLog {
    entries: Mutex<VecDeque<ActivityEntry>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
}

impl ActivityLog {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))), capacity, clock }
    }

    pub fn record(
        &self,
        level: ActivityLevel,
        component: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) {
        let entry = ActivityEntry {
            timestamp: DateTime::<Utc>::from(self.clock.system_time()),
            level,
            component: component.to_string(),
            message: message.into(),
            data,
        };

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        if self.capacity > 0 {
            entries.push_back(entry);
        }
    }

    /// Matching entries, oldest first
    pub fn entries(&self, query: &ActivityQuery) -> Vec<ActivityEntry> {
        let entries = self.entries.lock();
        let matched: Vec<_> = entries
            .iter()
            .filter(|e| query.level.map_or(true, |level| e.level == level))
            .filter(|e| query.component.as_deref().map_or(true, |c| e.component == c))
            .cloned()
            .collect();

        match query.limit {
            Some(limit) if limit < matched.len() => matched[matched.len() - limit..].to_vec(),
            _ => matched,
        }
    }

    pub fn stats(&self) -> ActivityStats {
        let entries = self.entries.lock();
        let mut stats = ActivityStats {
            total: entries.len(),
            by_level: ActivityLevel::ALL.into_iter().map(|level| (level, 0)).collect(),
            by_component: BTreeMap::new(),
        };
        for entry in entries.iter() {
            *stats.by_level.entry(entry.level).or_insert(0) += 1;
            *stats.by_component.entry(entry.component.clone()).or_insert(0) += 1;
        }
        stats
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
