//! Integration tests for `OfflineQueue` persistence
//!
//! **Coverage:**
//! - Save/load round trip through a byte store
//! - Entry cap, age pruning, record removal
//! - Corrupt data recovery

mod support;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use support::MemoryStore;
use versesync_common::{Clock, MockClock};
use versesync_core::OfflineQueue;
use versesync_domain::{
    OfflineConfig, OperationKind, PersistedTaskRecord, Priority, TaskId, TaskStatus,
};

struct Fixture {
    store: Arc<MemoryStore>,
    clock: MockClock,
    queue: OfflineQueue,
}

fn fixture(config: OfflineConfig) -> Fixture {
    let store = Arc::new(MemoryStore::default());
    let clock = MockClock::new();
    let queue = OfflineQueue::new(store.clone(), Arc::new(clock.clone()), config);
    Fixture { store, clock, queue }
}

fn record(id: &str, created_at: DateTime<Utc>) -> PersistedTaskRecord {
    PersistedTaskRecord {
        id: TaskId::from(id),
        operation: OperationKind::Like,
        priority: Priority::Normal,
        status: TaskStatus::Pending,
        payload: json!({ "post_id": id, "liked": true }),
        retry_count: 0,
        max_retries: 3,
        created_at,
    }
}

fn now(clock: &MockClock) -> DateTime<Utc> {
    DateTime::<Utc>::from(clock.system_time())
}

/// Validates `OfflineQueue::save` and `load` for the round trip scenario.
///
/// Assertions:
/// - Records come back in saved order with identical fields.
/// - The stored bytes are a JSON array.
#[tokio::test]
async fn saved_records_load_back_unchanged() {
    let f = fixture(OfflineConfig::default());
    let records = vec![record("a", now(&f.clock)), record("b", now(&f.clock))];

    f.queue.save(&records).await.unwrap();
    let loaded = f.queue.load().await.unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id, records[0].id);
    assert_eq!(loaded[1].payload, records[1].payload);
    assert_eq!(loaded[0].created_at.timestamp_millis(), records[0].created_at.timestamp_millis());

    let raw = f.store.raw(&OfflineConfig::default().storage_key).unwrap();
    let stored: serde_json::Value = serde_json::from_slice(&raw).unwrap();
    assert!(stored.is_array());
}

#[tokio::test]
async fn save_keeps_first_max_entries() {
    let f = fixture(OfflineConfig::default());
    let records: Vec<_> = (0..150).map(|i| record(&format!("t{i}"), now(&f.clock))).collect();

    f.queue.save(&records).await.unwrap();
    let loaded = f.queue.load().await.unwrap();

    assert_eq!(loaded.len(), 100);
    assert_eq!(loaded[0].id.as_str(), "t0");
    assert_eq!(loaded[99].id.as_str(), "t99");
}

/// Validates age pruning on load.
///
/// Assertions:
/// - Records at or past `max_age` are dropped.
/// - The pruned set is written back.
#[tokio::test]
async fn expired_records_are_pruned_on_load() {
    let config = OfflineConfig { max_age_secs: 60, ..OfflineConfig::default() };
    let f = fixture(config);
    let old = record("old", now(&f.clock));
    f.clock.advance(Duration::from_secs(30));
    let fresh = record("fresh", now(&f.clock));
    f.queue.save(&[old, fresh]).await.unwrap();

    f.clock.advance(Duration::from_secs(30));
    let loaded = f.queue.load().await.unwrap();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id.as_str(), "fresh");

    let raw = f.store.raw(&OfflineConfig::default().storage_key).unwrap();
    let stored: Vec<PersistedTaskRecord> = serde_json::from_slice(&raw).unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn remove_task_drops_only_that_record() {
    let f = fixture(OfflineConfig::default());
    f.queue
        .save(&[record("a", now(&f.clock)), record("b", now(&f.clock))])
        .await
        .unwrap();

    f.queue.remove_task(&TaskId::from("a")).await.unwrap();
    f.queue.remove_task(&TaskId::from("missing")).await.unwrap();

    let ids: Vec<_> = f.queue.load().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, [TaskId::from("b")]);
}

#[tokio::test]
async fn corrupt_data_reads_as_empty() {
    let f = fixture(OfflineConfig::default());
    f.store.put_raw(&OfflineConfig::default().storage_key, b"{not json");

    assert_eq!(f.queue.size().await.unwrap(), 0);

    f.queue.save(&[record("a", now(&f.clock))]).await.unwrap();
    assert_eq!(f.queue.size().await.unwrap(), 1);
}

#[tokio::test]
async fn clear_removes_the_key() {
    let f = fixture(OfflineConfig::default());
    f.queue.save(&[record("a", now(&f.clock))]).await.unwrap();

    f.queue.clear().await.unwrap();

    assert!(f.store.raw(&OfflineConfig::default().storage_key).is_none());
    assert_eq!(f.queue.size().await.unwrap(), 0);
}
