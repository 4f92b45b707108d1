//! # VerseSync Core
//!
//! The offline sync engine - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (storage, cache, notifications, connectivity,
//!   realtime transport, remote store)
//! - Scheduling: priority task queue, batch lanes, offline persistence
//! - Error classification, retry policy and circuit breakers
//! - The `SyncManager` orchestrator
//!
//! ## Architecture Principles
//! - Only depends on `versesync-common` and `versesync-domain`
//! - No file, HTTP, or platform code
//! - All external collaborators via traits

pub mod sync;

// Re-export the public engine surface
pub use sync::activity::{ActivityEntry, ActivityLevel, ActivityQuery, ActivityStats};
pub use sync::batch::{BatchAdd, BatchExecutor, BatchProcessor, BatchStatus};
pub use sync::error_handler::{
    classify, ErrorContext, ErrorHandler, ErrorKind, ErrorStats, ProcessedError, RetryPolicy,
};
pub use sync::dispatch::OperationDispatcher;
pub use sync::errors::{SyncError, SyncResult};
pub use sync::manager::{SyncManager, SyncManagerBuilder, TaskOptions};
pub use sync::mutation::{
    resolve_conflict, ConflictStrategy, MutationConfig, MutationRetry, MutationSyncManager,
};
pub use sync::network::{NetworkMonitor, NetworkSubscription, StatusListener};
pub use sync::ports::{
    CacheStore, ChangeHandler, ChannelHandle, ChannelSpec, ConnectivitySource, KeyValueStore,
    NotificationLevel, Notifier, RealtimeTransport, RemoteStore,
};
pub use sync::queue::{OfflineQueue, QueueStatus, ScheduledTask, TaskHandle, TaskQueue, TaskReport};
pub use sync::realtime::{RealtimeSubscriber, RealtimeSubscription};
