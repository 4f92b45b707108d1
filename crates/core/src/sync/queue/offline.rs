//! Durable mirror of pending tasks
//!
//! The offline queue is the only state that survives a restart. It stores a
//! JSON array of [`PersistedTaskRecord`]s under a single key of the
//! configured [`KeyValueStore`], capped at `max_entries` records. Records
//! older than `max_age` are pruned whenever the queue is loaded.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use versesync_common::Clock;
use versesync_domain::{OfflineConfig, PersistedTaskRecord, TaskId};

use crate::sync::errors::SyncResult;
use crate::sync::ports::KeyValueStore;

pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: OfflineConfig,
    // Serializes read-modify-write cycles
    io: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: OfflineConfig,
    ) -> Self {
        Self { store, clock, config, io: Mutex::new(()) }
    }

    /// Persist `records`, keeping the first `max_entries`.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn save(&self, records: &[PersistedTaskRecord]) -> SyncResult<()> {
        let _guard = self.io.lock().await;
        self.write(records).await
    }

    /// Load persisted records, dropping the ones past `max_age`.
    ///
    /// Unreadable data is treated as an empty queue.
    #[instrument(skip(self))]
    pub async fn load(&self) -> SyncResult<Vec<PersistedTaskRecord>> {
        let _guard = self.io.lock().await;
        self.read_pruned().await
    }

    /// Drop one record by id
    pub async fn remove_task(&self, id: &TaskId) -> SyncResult<()> {
        let _guard = self.io.lock().await;
        let mut records = self.read_pruned().await?;
        let before = records.len();
        records.retain(|record| &record.id != id);

        if records.len() != before {
            self.write(&records).await?;
            debug!(task_id = %id, "Removed task from offline queue");
        }
        Ok(())
    }

    pub async fn clear(&self) -> SyncResult<()> {
        let _guard = self.io.lock().await;
        self.store.remove(&self.config.storage_key).await?;
        info!("Offline queue cleared");
        Ok(())
    }

    /// Number of live (non-expired) records
    pub async fn size(&self) -> SyncResult<usize> {
        Ok(self.load().await?.len())
    }

    async fn write(&self, records: &[PersistedTaskRecord]) -> SyncResult<()> {
        let kept = &records[..records.len().min(self.config.max_entries)];
        if kept.len() < records.len() {
            warn!(
                dropped = records.len() - kept.len(),
                max_entries = self.config.max_entries,
                "Offline queue full, dropping newest records"
            );
        }

        let bytes = serde_json::to_vec(kept)?;
        self.store.set(&self.config.storage_key, bytes).await?;
        debug!(count = kept.len(), "Offline queue saved");
        Ok(())
    }

    async fn read_pruned(&self) -> SyncResult<Vec<PersistedTaskRecord>> {
        let Some(bytes) = self.store.get(&self.config.storage_key).await? else {
            return Ok(Vec::new());
        };

        let records: Vec<PersistedTaskRecord> = match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Offline queue data is unreadable, ignoring it");
                return Ok(Vec::new());
            }
        };

        let now_ms = self.clock.millis_since_epoch() as i64;
        let max_age_ms = self.config.max_age().as_millis() as i64;
        let total = records.len();
        let live: Vec<_> = records
            .into_iter()
            .filter(|record| now_ms - record.created_at.timestamp_millis() < max_age_ms)
            .collect();

        if live.len() != total {
            info!(pruned = total - live.len(), "Pruned expired offline tasks");
            self.write(&live).await?;
        }
        Ok(live)
    }
}
