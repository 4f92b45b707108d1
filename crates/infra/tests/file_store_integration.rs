//! Integration tests for `FileKeyValueStore`

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tempfile::TempDir;
use versesync_common::SystemClock;
use versesync_core::{KeyValueStore, OfflineQueue};
use versesync_domain::{
    OfflineConfig, OperationKind, PersistedTaskRecord, Priority, TaskId, TaskStatus,
};
use versesync_infra::FileKeyValueStore;

#[tokio::test]
async fn values_round_trip_and_replace_atomically() {
    let dir = TempDir::new().unwrap();
    let store = FileKeyValueStore::new(dir.path().join("state"));

    assert!(store.get("sync-offline-queue").await.unwrap().is_none());

    store.set("sync-offline-queue", b"[1]".to_vec()).await.unwrap();
    store.set("sync-offline-queue", b"[1,2]".to_vec()).await.unwrap();

    assert_eq!(store.get("sync-offline-queue").await.unwrap(), Some(b"[1,2]".to_vec()));
    let leftovers: Vec<_> = std::fs::read_dir(store.root())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    store.remove("sync-offline-queue").await.unwrap();
    store.remove("sync-offline-queue").await.unwrap();
    assert!(store.get("sync-offline-queue").await.unwrap().is_none());
}

/// Validates offline records survive a process restart.
///
/// Assertions:
/// - A second store over the same directory loads what the first saved.
#[tokio::test]
async fn offline_queue_survives_restart() {
    let dir = TempDir::new().unwrap();
    let record = PersistedTaskRecord {
        id: TaskId::from("like-1"),
        operation: OperationKind::Like,
        priority: Priority::High,
        status: TaskStatus::Pending,
        payload: json!({ "post_id": "p1", "liked": true }),
        retry_count: 1,
        max_retries: 3,
        created_at: Utc::now(),
    };

    let first = OfflineQueue::new(
        Arc::new(FileKeyValueStore::new(dir.path())),
        Arc::new(SystemClock),
        OfflineConfig::default(),
    );
    first.save(std::slice::from_ref(&record)).await.unwrap();
    drop(first);

    let second = OfflineQueue::new(
        Arc::new(FileKeyValueStore::new(dir.path())),
        Arc::new(SystemClock),
        OfflineConfig::default(),
    );
    let loaded = second.load().await.unwrap();

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].id, record.id);
    assert_eq!(loaded[0].priority, Priority::High);
    assert_eq!(loaded[0].retry_count, 1);
}
