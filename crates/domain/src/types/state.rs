//! Engine state snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Queued plus batched tasks not yet started
    pub pending_tasks: usize,
    pub processing_tasks: usize,
    pub failed_tasks: usize,
    pub is_online: bool,
    pub offline_queue_size: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
}
