//! Port interfaces for the sync engine's external collaborators

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;
use versesync_common::CommonResult;
use versesync_domain::{
    CacheKey, ChangeEvent, CommentPayload, Connectivity, DeletePayload, EventFilter, LikePayload,
    PostPayload, RemoteError, UpdatePayload,
};

use super::errors::SyncResult;

/// Durable key-value byte store backing the offline queue
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the bytes stored under `key`, if any
    async fn get(&self, key: &str) -> CommonResult<Option<Vec<u8>>>;

    /// Replace the bytes stored under `key`
    async fn set(&self, key: &str, value: Vec<u8>) -> CommonResult<()>;

    /// Drop `key`; missing keys are not an error
    async fn remove(&self, key: &str) -> CommonResult<()>;
}

/// Local cache the UI reads from
///
/// Reads and writes are synchronous so optimistic updates land before the
/// remote call is issued. Invalidation may trigger a refetch.
#[async_trait]
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Option<Value>;

    fn set(&self, key: &CacheKey, value: Value);

    async fn invalidate(&self, key: &CacheKey);
}

/// Alert style shown to the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationLevel {
    Error,
    Warning,
    Info,
}

/// Fire-and-forget user notification sink
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotificationLevel, message: &str, duration: Duration);
}

/// Platform connectivity feed
pub trait ConnectivitySource: Send + Sync {
    /// Current reading
    fn current(&self) -> Connectivity;

    /// Receiver that observes every subsequent reading
    fn watch(&self) -> watch::Receiver<Connectivity>;
}

/// Callback receiving change events for one channel
pub type ChangeHandler = Arc<dyn Fn(ChangeEvent) + Send + Sync>;

/// What a realtime channel listens to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub name: String,
    pub table: String,
    pub filter: EventFilter,
}

/// Open realtime channel
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Stop delivery; closing twice is a no-op
    async fn close(&self);
}

/// Remote change-notification transport
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    /// Open a channel delivering matching events to `sink`
    async fn open_channel(
        &self,
        spec: ChannelSpec,
        sink: ChangeHandler,
    ) -> SyncResult<Box<dyn ChannelHandle>>;
}

/// Remote data store receiving mutations
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn toggle_like(&self, payload: &LikePayload) -> Result<(), RemoteError>;

    async fn create_comment(&self, payload: &CommentPayload) -> Result<(), RemoteError>;

    async fn create_post(&self, payload: &PostPayload) -> Result<(), RemoteError>;

    async fn delete_record(&self, payload: &DeletePayload) -> Result<(), RemoteError>;

    async fn update_record(&self, payload: &UpdatePayload) -> Result<(), RemoteError>;
}
