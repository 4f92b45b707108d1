//! # VerseSync Infrastructure
//!
//! Adapters implementing the ports defined in `versesync-core`.
//!
//! This crate contains:
//! - Key-value stores for the offline queue (file, in-memory)
//! - moka-backed query cache
//! - Connectivity sources (watch channel, HTTP reachability poller)
//! - In-process realtime transport and broadcast notifier
//! - REST remote store (reqwest)
//! - Configuration loading and tracing setup
//!
//! ## Architecture
//! - Implements traits defined in `versesync-core`
//! - Contains all I/O

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod errors;
pub mod notify;
pub mod observability;
pub mod realtime;
pub mod remote;
pub mod storage;

// Re-export commonly used items
pub use cache::{MokaCacheConfig, MokaCacheStore};
pub use connectivity::{spawn_reachability_poller, WatchConnectivity};
pub use errors::{InfraError, InfraResult};
pub use notify::{BroadcastNotifier, Notification};
pub use observability::{init_tracing, LogFormat};
pub use realtime::LoopbackRealtime;
pub use remote::{RestRemoteStore, RestRemoteStoreBuilder};
pub use storage::{FileKeyValueStore, MemoryKeyValueStore};
