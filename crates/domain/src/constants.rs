//! Engine constants
//!
//! Defaults for every knob in [`crate::SyncConfig`], kept in one place so the
//! config loader and tests agree on them.

// Scheduling
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MAX_CONCURRENT: usize = 3;
pub const DEFAULT_TASK_MAX_RETRIES: u32 = 3;

// Batching
pub const DEFAULT_MAX_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_MAX_WAIT_MS: u64 = 1000;

// Offline persistence
pub const OFFLINE_QUEUE_STORAGE_KEY: &str = "sync-offline-queue";
pub const DEFAULT_OFFLINE_MAX_ENTRIES: usize = 100;
pub const DEFAULT_OFFLINE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

// Mutations
pub const DEFAULT_MUTATION_RETRY_DELAY_MS: u64 = 1000;

// Notification display durations
pub const NOTIFY_ERROR_DURATION_MS: u64 = 5000;
pub const NOTIFY_WARNING_DURATION_MS: u64 = 4000;
pub const NOTIFY_INFO_DURATION_MS: u64 = 3000;

// Environment variable prefix for config overrides
pub const ENV_PREFIX: &str = "VERSESYNC_";
