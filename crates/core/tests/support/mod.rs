//! Shared test helpers for `versesync-core` integration tests.
//!
//! In-memory implementations of every port so scenarios can drive the
//! engine end to end without files, HTTP or a realtime server.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use versesync_common::{CommonResult, MockClock};
use versesync_core::{
    CacheStore, ChangeHandler, ChannelHandle, ChannelSpec, ConnectivitySource, KeyValueStore,
    NotificationLevel, Notifier, RealtimeTransport, RemoteStore, SyncManager,
    SyncManagerBuilder, SyncResult,
};
use versesync_domain::{
    CacheKey, ChangeEvent, CommentPayload, Connectivity, DeletePayload, LikePayload,
    PostPayload, RemoteError, SyncConfig, UpdatePayload,
};

/// Byte store backed by a `HashMap`
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.values.lock().get(key).cloned()
    }

    pub fn put_raw(&self, key: &str, bytes: &[u8]) {
        self.values.lock().insert(key.to_string(), bytes.to_vec());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CommonResult<Option<Vec<u8>>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CommonResult<()> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> CommonResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }
}

/// Cache that records invalidations
#[derive(Default)]
pub struct RecordingCache {
    values: Mutex<HashMap<CacheKey, Value>>,
    pub invalidated: Mutex<Vec<CacheKey>>,
}

#[async_trait]
impl CacheStore for RecordingCache {
    fn get(&self, key: &CacheKey) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &CacheKey, value: Value) {
        self.values.lock().insert(key.clone(), value);
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.values.lock().remove(key);
        self.invalidated.lock().push(key.clone());
    }
}

/// Remote store that fails with scripted errors, then succeeds.
///
/// Every call is recorded as `"{operation}:{id}"`.
#[derive(Default)]
pub struct ScriptedRemote {
    failures: Mutex<VecDeque<RemoteError>>,
    always: Mutex<Option<RemoteError>>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedRemote {
    /// Fail the next calls, in order, with `errors`
    pub fn fail_next(&self, errors: impl IntoIterator<Item = RemoteError>) {
        self.failures.lock().extend(errors);
    }

    /// Fail every call with `error`
    pub fn fail_always(&self, error: RemoteError) {
        *self.always.lock() = Some(error);
    }

    /// Stop failing: drop the scripted and permanent errors
    pub fn recover(&self) {
        *self.always.lock() = None;
        self.failures.lock().clear();
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn answer(&self, call: String) -> Result<(), RemoteError> {
        self.calls.lock().push(call);
        if let Some(error) = self.always.lock().clone() {
            return Err(error);
        }
        match self.failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for ScriptedRemote {
    async fn toggle_like(&self, payload: &LikePayload) -> Result<(), RemoteError> {
        self.answer(format!("like:{}", payload.post_id))
    }

    async fn create_comment(&self, payload: &CommentPayload) -> Result<(), RemoteError> {
        self.answer(format!("comment:{}", payload.post_id))
    }

    async fn create_post(&self, payload: &PostPayload) -> Result<(), RemoteError> {
        self.answer(format!("post:{}", payload.title))
    }

    async fn delete_record(&self, payload: &DeletePayload) -> Result<(), RemoteError> {
        self.answer(format!("delete:{}", payload.record_id))
    }

    async fn update_record(&self, payload: &UpdatePayload) -> Result<(), RemoteError> {
        self.answer(format!("update:{}", payload.record_id))
    }
}

/// Connectivity source the test flips by hand
pub struct SwitchableNetwork {
    tx: watch::Sender<Connectivity>,
}

impl SwitchableNetwork {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn set(&self, reading: Connectivity) {
        self.tx.send_replace(reading);
    }
}

impl ConnectivitySource for SwitchableNetwork {
    fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

/// Realtime transport whose channels the test feeds directly
#[derive(Default)]
pub struct LocalRealtime {
    sinks: Arc<Mutex<HashMap<String, ChangeHandler>>>,
}

struct LocalChannel {
    name: String,
    sinks: Arc<Mutex<HashMap<String, ChangeHandler>>>,
}

#[async_trait]
impl ChannelHandle for LocalChannel {
    async fn close(&self) {
        self.sinks.lock().remove(&self.name);
    }
}

#[async_trait]
impl RealtimeTransport for LocalRealtime {
    async fn open_channel(
        &self,
        spec: ChannelSpec,
        sink: ChangeHandler,
    ) -> SyncResult<Box<dyn ChannelHandle>> {
        self.sinks.lock().insert(spec.name.clone(), sink);
        Ok(Box::new(LocalChannel { name: spec.name, sinks: self.sinks.clone() }))
    }
}

impl LocalRealtime {
    pub fn emit(&self, channel: &str, event: ChangeEvent) {
        let sink = self.sinks.lock().get(channel).cloned();
        if let Some(sink) = sink {
            sink(event);
        }
    }

    pub fn open_channels(&self) -> usize {
        self.sinks.lock().len()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(NotificationLevel, String, Duration)>>,
}

impl Notifier for RecordingNotifier {
    fn notify(&self, level: NotificationLevel, message: &str, duration: Duration) {
        self.sent.lock().push((level, message.to_string(), duration));
    }
}

/// All collaborators of one engine instance
pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub cache: Arc<RecordingCache>,
    pub remote: Arc<ScriptedRemote>,
    pub network: Arc<SwitchableNetwork>,
    pub realtime: Arc<LocalRealtime>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(initial: Connectivity) -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            cache: Arc::new(RecordingCache::default()),
            remote: Arc::new(ScriptedRemote::default()),
            network: Arc::new(SwitchableNetwork::new(initial)),
            realtime: Arc::new(LocalRealtime::default()),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn builder(&self, config: SyncConfig) -> SyncManagerBuilder {
        SyncManager::builder(config)
            .key_value_store(self.store.clone())
            .cache(self.cache.clone())
            .remote(self.remote.clone())
            .realtime(self.realtime.clone())
            .connectivity(self.network.clone())
            .notifier(self.notifier.clone())
    }

    pub async fn start(&self) -> SyncManager {
        self.builder(SyncConfig::default()).start().await.expect("engine starts")
    }

    /// Start with a hand-driven clock for breaker timing
    pub async fn start_with_clock(&self, clock: &MockClock) -> SyncManager {
        self.builder(SyncConfig::default())
            .clock(Arc::new(clock.clone()))
            .start()
            .await
            .expect("engine starts")
    }
}

pub fn like(post_id: &str) -> versesync_domain::SyncOperation {
    versesync_domain::SyncOperation::Like(LikePayload { post_id: post_id.into(), liked: true })
}

/// Install a test subscriber once; `RUST_LOG` controls verbosity
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}
