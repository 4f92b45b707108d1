//! Sync orchestrator
//!
//! [`SyncManager`] owns one of each engine component and runs the scheduling
//! loop. It is constructed explicitly through [`SyncManagerBuilder`] and torn
//! down with [`SyncManager::destroy`].
//!
//! ## Scheduling
//!
//! Every `tick_interval` the loop dequeues at most one task (the queue's
//! concurrency cap still applies) and runs it on its own tokio task. Nothing
//! is dequeued while the network is known to be offline. A transition to
//! online re-enqueues offline records missing from the queue and ticks
//! immediately.
//!
//! ## Failure path
//!
//! A failed task goes through the [`ErrorHandler`]. When the handler allows a
//! retry and the task still has budget, its retry count is bumped, the
//! breaker failure is recorded, the task is deferred in the queue and the
//! pending set is persisted; it is re-enqueued after the backoff delay.
//! Otherwise the task is marked failed, dropped from the offline queue,
//! surfaced to the notifier and its waiter is rejected. A completed task
//! clears the breakers of its operation.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use versesync_common::{Clock, CommonError, SystemClock};
use versesync_domain::{
    CacheKey, NetworkStatus, OperationKind, PersistedTaskRecord, Priority, RemoteError,
    SyncConfig, SyncOperation, SyncState, TaskId, TaskStatus,
};

use super::activity::{
    ActivityEntry, ActivityLevel, ActivityLog, ActivityQuery, ActivityStats,
    DEFAULT_ACTIVITY_CAPACITY,
};
use super::batch::{BatchExecutor, BatchProcessor};
use super::dispatch::OperationDispatcher;
use super::error_handler::{ErrorContext, ErrorHandler, ErrorStats};
use super::errors::{SyncError, SyncResult};
use super::mutation::{MutationConfig, MutationSyncManager};
use super::network::{NetworkMonitor, NetworkSubscription};
use super::ports::{
    CacheStore, ConnectivitySource, KeyValueStore, Notifier, RealtimeTransport, RemoteStore,
};
use super::queue::{OfflineQueue, ScheduledTask, TaskHandle, TaskQueue};
use super::realtime::{RealtimeSubscriber, RealtimeSubscription};

const COMPONENT: &str = "SyncManager";

/// Per-task submission options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskOptions {
    pub priority: Priority,
    /// Falls back to `SyncConfig::default_max_retries`
    pub max_retries: Option<u32>,
}

impl TaskOptions {
    pub fn priority(priority: Priority) -> Self {
        Self { priority, max_retries: None }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Collects the collaborators a [`SyncManager`] needs
#[derive(Default)]
pub struct SyncManagerBuilder {
    config: SyncConfig,
    clock: Option<Arc<dyn Clock>>,
    store: Option<Arc<dyn KeyValueStore>>,
    cache: Option<Arc<dyn CacheStore>>,
    remote: Option<Arc<dyn RemoteStore>>,
    realtime: Option<Arc<dyn RealtimeTransport>>,
    connectivity: Option<Arc<dyn ConnectivitySource>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl SyncManagerBuilder {
    pub fn new(config: SyncConfig) -> Self {
        Self { config, ..Self::default() }
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    #[must_use]
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn cache(mut self, cache: Arc<dyn CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn realtime(mut self, transport: Arc<dyn RealtimeTransport>) -> Self {
        self.realtime = Some(transport);
        self
    }

    #[must_use]
    pub fn connectivity(mut self, source: Arc<dyn ConnectivitySource>) -> Self {
        self.connectivity = Some(source);
        self
    }

    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Validate the configuration, restore persisted tasks and start the
    /// scheduling loop.
    ///
    /// # Errors
    /// Fails on an invalid configuration, a missing collaborator, or when
    /// the offline queue cannot be read.
    pub async fn start(self) -> SyncResult<SyncManager> {
        self.config.validate()?;

        let store = required(self.store, "key_value_store")?;
        let cache = required(self.cache, "cache")?;
        let remote = required(self.remote, "remote")?;
        let transport = required(self.realtime, "realtime")?;
        let connectivity = required(self.connectivity, "connectivity")?;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let config = self.config;

        let mut errors = ErrorHandler::new(clock.clone(), config.locale);
        if let Some(notifier) = self.notifier {
            errors = errors.with_notifier(notifier);
        }
        errors.set_notifications_enabled(config.notifications_enabled);
        let errors = Arc::new(errors);

        let dispatcher = Arc::new(OperationDispatcher::new(remote, cache.clone()));
        let last_sync = Arc::new(Mutex::new(None));
        let inner = Arc::new(Inner {
            queue: TaskQueue::new(config.max_concurrent, clock.clone()),
            offline: OfflineQueue::new(store, clock.clone(), config.offline.clone()),
            batch: BatchProcessor::new(config.batch.clone()),
            network: NetworkMonitor::new(),
            mutations: MutationSyncManager::new(cache, errors.clone()),
            realtime: RealtimeSubscriber::new(transport),
            activity: ActivityLog::new(DEFAULT_ACTIVITY_CAPACITY, clock.clone()),
            batch_executor: Arc::new(RefreshBatchExecutor {
                dispatcher: dispatcher.clone(),
                errors: errors.clone(),
                clock: clock.clone(),
                last_sync: last_sync.clone(),
            }),
            last_sync,
            dispatcher,
            errors,
            clock,
            failed: AtomicUsize::new(0),
            cancel: CancellationToken::new(),
            config,
        });

        inner.restore_offline_tasks().await?;

        inner.network.start(connectivity);
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let relay_status = move |status: NetworkStatus| {
            // Receiver is gone only after shutdown
            let _ = status_tx.send(status);
        };
        let network_subscription = inner.network.subscribe(Arc::new(relay_status));

        let driver = tokio::spawn(run_loop(inner.clone(), status_rx));
        info!(
            tick_ms = inner.config.tick_interval_ms,
            max_concurrent = inner.config.max_concurrent,
            "SyncManager started"
        );
        inner.activity.record(ActivityLevel::Info, COMPONENT, "SyncManager initialized", None);

        Ok(SyncManager {
            inner,
            driver: Mutex::new(Some(driver)),
            network_subscription: Mutex::new(Some(network_subscription)),
        })
    }
}

fn required<T: ?Sized>(value: Option<Arc<T>>, field: &str) -> SyncResult<Arc<T>> {
    value.ok_or_else(|| {
        CommonError::config_field(field, format!("SyncManager requires a {field}")).into()
    })
}

/// Public entry point of the engine
pub struct SyncManager {
    inner: Arc<Inner>,
    driver: Mutex<Option<JoinHandle<()>>>,
    network_subscription: Mutex<Option<NetworkSubscription>>,
}

impl SyncManager {
    pub fn builder(config: SyncConfig) -> SyncManagerBuilder {
        SyncManagerBuilder::new(config)
    }

    /// Schedule `operation`; the returned handle settles once the task
    /// completes or fails permanently.
    ///
    /// Refreshes at normal priority go to the batch lanes; everything else
    /// is queued, and mirrored to the offline queue while offline.
    ///
    /// # Errors
    /// Fails after shutdown or when the pending set cannot be persisted.
    #[instrument(
        skip(self, operation, options),
        fields(operation = %operation.kind(), priority = %options.priority)
    )]
    pub async fn create_task(
        &self,
        operation: SyncOperation,
        options: TaskOptions,
    ) -> SyncResult<TaskHandle> {
        if self.inner.cancel.is_cancelled() {
            return Err(SyncError::ShuttingDown);
        }

        let max_retries = options.max_retries.unwrap_or(self.inner.config.default_max_retries);
        let (task, handle) =
            ScheduledTask::new(operation, options.priority, max_retries, self.inner.now());
        let kind = task.kind();
        info!(task_id = %task.id, "Task created");
        self.inner.activity.record(
            ActivityLevel::Info,
            COMPONENT,
            format!("Task created: {}", task.id),
            Some(json!({ "operation": kind, "priority": options.priority })),
        );

        if kind == OperationKind::Refresh && options.priority == Priority::Normal {
            let executor: Arc<dyn BatchExecutor> = self.inner.batch_executor.clone();
            self.inner.batch.add_task(task, executor)?;
        } else {
            self.inner.queue.enqueue(task)?;
            if self.inner.network.is_offline() {
                self.inner.persist_pending().await?;
            }
        }
        Ok(handle)
    }

    /// Cancel a task that has not started yet and drop its offline record.
    ///
    /// # Errors
    /// In-flight and unknown tasks cannot be cancelled.
    pub async fn cancel_task(&self, id: &TaskId) -> SyncResult<()> {
        self.inner.queue.cancel(id)?;
        self.inner.offline.remove_task(id).await?;
        self.inner.activity.record(
            ActivityLevel::Info,
            COMPONENT,
            format!("Task cancelled: {id}"),
            None,
        );
        Ok(())
    }

    /// Drain every batch lane now
    pub async fn flush_batches(&self) -> SyncResult<()> {
        let executor: Arc<dyn BatchExecutor> = self.inner.batch_executor.clone();
        self.inner.batch.flush_all(executor).await
    }

    /// Run a mutation with optimistic update and rollback
    pub async fn execute_mutation<T, F, Fut>(
        &self,
        cache_key: &CacheKey,
        remote_call: F,
        config: MutationConfig<T>,
    ) -> SyncResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let result = self.inner.mutations.execute_mutation(cache_key, remote_call, config).await;
        match &result {
            Ok(_) => self.inner.activity.record(
                ActivityLevel::Info,
                "MutationSyncManager",
                format!("Mutation succeeded: {cache_key}"),
                None,
            ),
            Err(e) => self.inner.activity.record(
                ActivityLevel::Error,
                "MutationSyncManager",
                format!("Mutation failed: {cache_key}"),
                Some(json!({ "error": e.to_string() })),
            ),
        }
        result
    }

    pub async fn subscribe(&self, subscription: RealtimeSubscription) -> SyncResult<()> {
        self.inner.realtime.subscribe(subscription).await
    }

    pub async fn unsubscribe(&self, channel: &str) {
        self.inner.realtime.unsubscribe(channel).await;
    }

    pub async fn unsubscribe_all(&self) {
        self.inner.realtime.unsubscribe_all().await;
    }

    pub fn set_current_user_id(&self, user_id: Option<String>) {
        self.inner.realtime.set_current_user_id(user_id);
    }

    pub fn set_notifications_enabled(&self, enabled: bool) {
        self.inner.errors.set_notifications_enabled(enabled);
    }

    /// Snapshot of queue, network and offline state.
    ///
    /// # Errors
    /// Fails when the offline queue cannot be read.
    pub async fn state(&self) -> SyncResult<SyncState> {
        let queue = self.inner.queue.status();
        let batched = self.inner.batch.status().total();
        Ok(SyncState {
            pending_tasks: queue.pending + queue.retrying + batched,
            processing_tasks: queue.processing,
            failed_tasks: self.inner.failed.load(Ordering::Relaxed),
            is_online: self.inner.network.is_online(),
            offline_queue_size: self.inner.offline.size().await?,
            last_sync_time: *self.inner.last_sync.lock(),
        })
    }

    pub fn network_status(&self) -> NetworkStatus {
        self.inner.network.status()
    }

    pub fn error_stats(&self) -> ErrorStats {
        self.inner.errors.error_stats()
    }

    pub fn logs(&self, query: &ActivityQuery) -> Vec<ActivityEntry> {
        self.inner.activity.entries(query)
    }

    pub fn log_stats(&self) -> ActivityStats {
        self.inner.activity.stats()
    }

    /// Stop the loop, persist and drop pending work, close channels.
    /// Calling it again is a no-op.
    pub async fn destroy(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.cancel.cancel();

        let driver = self.driver.lock().take();
        if let Some(driver) = driver {
            // Loop exits at its next select
            let _ = driver.await;
        }
        drop(self.network_subscription.lock().take());
        self.inner.network.stop();
        self.inner.batch.destroy();

        if let Err(e) = self.inner.persist_pending().await {
            warn!(error = %e, "Failed to persist pending tasks on shutdown");
        }
        self.inner.queue.clear();
        self.inner.realtime.unsubscribe_all().await;

        info!("SyncManager destroyed");
        self.inner.activity.record(ActivityLevel::Info, COMPONENT, "SyncManager destroyed", None);
    }
}

impl Drop for SyncManager {
    fn drop(&mut self) {
        self.inner.cancel.cancel();
    }
}

struct Inner {
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    queue: TaskQueue,
    offline: OfflineQueue,
    batch: BatchProcessor,
    batch_executor: Arc<RefreshBatchExecutor>,
    network: NetworkMonitor,
    errors: Arc<ErrorHandler>,
    mutations: MutationSyncManager,
    realtime: RealtimeSubscriber,
    dispatcher: Arc<OperationDispatcher>,
    activity: ActivityLog,
    last_sync: Arc<Mutex<Option<DateTime<Utc>>>>,
    failed: AtomicUsize,
    cancel: CancellationToken,
}

async fn run_loop(inner: Arc<Inner>, mut statuses: mpsc::UnboundedReceiver<NetworkStatus>) {
    let mut ticker = tokio::time::interval(inner.config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = inner.cancel.cancelled() => break,
            Some(status) = statuses.recv() => {
                if status == NetworkStatus::Online {
                    inner.drain_offline_queue().await;
                    inner.tick();
                }
            }
            _ = ticker.tick() => inner.tick(),
        }
    }
    debug!("Scheduling loop stopped");
}

impl Inner {
    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time())
    }

    fn tick(self: &Arc<Self>) {
        if self.network.is_offline() {
            return;
        }

        match self.queue.dequeue() {
            Ok(Some(task)) => {
                tokio::spawn(self.clone().run_task(task));
            }
            Ok(None) => {}
            Err(e) => error!(error = %e, "Failed to dequeue task"),
        }
    }

    async fn run_task(self: Arc<Self>, task: ScheduledTask) {
        debug!(
            task_id = %task.id,
            operation = %task.kind(),
            priority = %task.priority,
            "Processing task"
        );
        let result = self.dispatcher.execute(&task.operation).await;
        match result {
            Ok(()) => self.complete_task(task).await,
            Err(remote) => self.handle_failure(task, remote).await,
        }
    }

    async fn complete_task(&self, task: ScheduledTask) {
        let id = task.id.clone();
        self.queue.complete(&id);
        self.errors.record_success(&task.kind().to_string());
        if let Err(e) = self.offline.remove_task(&id).await {
            warn!(task_id = %id, error = %e, "Failed to drop completed task from offline queue");
        }

        let now = self.now();
        *self.last_sync.lock() = Some(now);
        let started = task.started_at;
        let report = task.resolve(now);

        let duration_ms = started.map(|s| (now - s).num_milliseconds());
        info!(task_id = %id, operation = %report.operation, ?duration_ms, "Task completed");
        self.activity.record(
            ActivityLevel::Info,
            COMPONENT,
            format!("Task completed: {id}"),
            Some(json!({ "operation": report.operation, "durationMs": duration_ms })),
        );
    }

    async fn handle_failure(self: Arc<Self>, mut task: ScheduledTask, remote: RemoteError) {
        let context = ErrorContext::new(task.kind().to_string())
            .with_payload(task.operation.payload_json().unwrap_or(Value::Null))
            .with_retry_count(task.retry_count);
        let processed = self.errors.process_error(&remote, context.clone());

        if processed.retryable && task.retry_count < task.max_retries {
            task.retry_count += 1;
            task.error = Some(processed.message.clone());
            let delay = self.errors.calculate_retry_delay(processed.kind, task.retry_count);
            warn!(
                task_id = %task.id,
                operation = %task.kind(),
                retry_count = task.retry_count,
                delay_ms = delay.as_millis() as u64,
                error_kind = %processed.kind,
                "Task failed, will retry"
            );
            self.activity.record(
                ActivityLevel::Warn,
                COMPONENT,
                format!("Task failed, will retry: {}", task.id),
                Some(json!({ "retryCount": task.retry_count, "errorKind": processed.kind })),
            );
            self.errors.record_failure(processed.kind, &context);
            if let Err(e) = self.queue.defer(&task) {
                error!(task_id = %task.id, error = %e, "Cannot defer task for retry");
                self.queue.fail(&task.id);
                task.reject(TaskStatus::Failed, e);
                return;
            }
            if let Err(e) = self.persist_pending().await {
                warn!(error = %e, "Failed to persist pending tasks before retry");
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    task.reject(TaskStatus::Cancelled, SyncError::ShuttingDown);
                    return;
                }
                () = tokio::time::sleep(delay) => {}
            }

            self.requeue(task);
            return;
        }

        let id = task.id.clone();
        self.queue.fail(&id);
        if let Err(e) = self.offline.remove_task(&id).await {
            warn!(task_id = %id, error = %e, "Failed to drop failed task from offline queue");
        }
        self.failed.fetch_add(1, Ordering::Relaxed);

        error!(
            task_id = %id,
            operation = %task.kind(),
            error_kind = %processed.kind,
            severity = %processed.severity,
            retry_count = task.retry_count,
            "Task failed permanently"
        );
        self.activity.record(
            ActivityLevel::Error,
            COMPONENT,
            format!("Task failed permanently: {id}"),
            Some(json!({ "errorKind": processed.kind, "message": processed.message })),
        );

        self.errors.show_notification(&processed);
        task.reject(TaskStatus::Failed, SyncError::from(processed));
    }

    fn requeue(&self, mut task: ScheduledTask) {
        if let Err(e) = task.transition(TaskStatus::Pending) {
            error!(task_id = %task.id, error = %e, "Cannot requeue task");
            task.reject(TaskStatus::Failed, e.into());
            return;
        }
        let id = task.id.clone();
        if let Err(e) = self.queue.resume(task) {
            error!(task_id = %id, error = %e, "Cannot requeue task");
        }
    }

    async fn persist_pending(&self) -> SyncResult<()> {
        let records = self.queue.pending_records()?;
        self.offline.save(&records).await
    }

    async fn restore_offline_tasks(&self) -> SyncResult<()> {
        let records = self.offline.load().await?;
        let restored = self.enqueue_records(records);
        if restored > 0 {
            info!(count = restored, "Restored offline tasks");
        }
        Ok(())
    }

    async fn drain_offline_queue(&self) {
        let records = match self.offline.load().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read offline queue on reconnect");
                return;
            }
        };
        let restored = self.enqueue_records(records);
        let pending = self.queue.status().pending;
        info!(restored, pending, "Back online, processing pending tasks");
    }

    /// Enqueue pending records that are not queued yet
    fn enqueue_records(&self, records: Vec<PersistedTaskRecord>) -> usize {
        let mut restored = 0;
        for record in records {
            if record.status != TaskStatus::Pending || self.queue.contains(&record.id) {
                continue;
            }
            let id = record.id.clone();
            let task = match ScheduledTask::from_record(record) {
                Ok(task) => task,
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Skipping unreadable offline task");
                    continue;
                }
            };
            match self.queue.enqueue(task) {
                Ok(()) => restored += 1,
                Err(e) => warn!(task_id = %id, error = %e, "Skipping offline task"),
            }
        }
        restored
    }
}

/// Runs refresh batches and settles each task on its own result
struct RefreshBatchExecutor {
    dispatcher: Arc<OperationDispatcher>,
    errors: Arc<ErrorHandler>,
    clock: Arc<dyn Clock>,
    last_sync: Arc<Mutex<Option<DateTime<Utc>>>>,
}

#[async_trait]
impl BatchExecutor for RefreshBatchExecutor {
    async fn execute(&self, batch: Vec<ScheduledTask>) -> SyncResult<()> {
        let results =
            join_all(batch.iter().map(|task| self.dispatcher.execute(&task.operation))).await;
        let now = DateTime::<Utc>::from(self.clock.system_time());
        let total = batch.len();
        let mut failed = 0;

        for (task, result) in batch.into_iter().zip(results) {
            match result {
                Ok(()) => {
                    task.resolve(now);
                }
                Err(remote) => {
                    failed += 1;
                    let context = ErrorContext::new(task.kind().to_string());
                    let processed = self.errors.process_error(&remote, context);
                    task.reject(TaskStatus::Failed, SyncError::from(processed));
                }
            }
        }

        if failed > 0 {
            return Err(SyncError::BatchFailed { failed, total });
        }
        *self.last_sync.lock() = Some(now);
        Ok(())
    }
}
