//! Per-priority batching of best-effort work
//!
//! Tasks are appended to the lane of their priority. A lane flushes as soon
//! as it holds `max_batch_size` tasks, or `max_wait` after its first task
//! arrived, whichever comes first. A flush hands the lane's snapshot to a
//! [`BatchExecutor`], which takes ownership of the tasks and settles their
//! waiters. A failed flush does not put tasks back into the lane.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use versesync_domain::{BatchConfig, Priority, TaskStatus};

use super::errors::{SyncError, SyncResult};
use super::queue::ScheduledTask;

/// Consumer of a flushed batch
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    async fn execute(&self, batch: Vec<ScheduledTask>) -> SyncResult<()>;
}

/// What `add_task` did with the task
#[derive(Debug)]
pub enum BatchAdd {
    /// Waiting in its lane
    Queued { lane_len: usize },
    /// Filled the lane; the flush runs on the returned task
    Flushed(JoinHandle<SyncResult<()>>),
}

/// Tasks waiting in each lane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchStatus {
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

impl BatchStatus {
    pub fn total(&self) -> usize {
        self.high + self.normal + self.low
    }
}

#[derive(Default)]
struct Lane {
    tasks: Vec<ScheduledTask>,
    timer: Option<JoinHandle<()>>,
    // Bumped on every flush so a stale timer never drains a newer window
    generation: u64,
    executor: Option<Arc<dyn BatchExecutor>>,
}

impl Lane {
    fn take(&mut self) -> Vec<ScheduledTask> {
        self.generation += 1;
        std::mem::take(&mut self.tasks)
    }
}

struct Inner {
    config: BatchConfig,
    lanes: Mutex<HashMap<Priority, Lane>>,
    closed: AtomicBool,
}

#[derive(Clone)]
pub struct BatchProcessor {
    inner: Arc<Inner>,
}

impl BatchProcessor {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                lanes: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Append `task` to its priority lane.
    ///
    /// Must be called within a tokio runtime: the lane timer and a
    /// size-triggered flush are spawned tasks.
    ///
    /// # Errors
    /// Returns `SyncError::ShuttingDown` (and rejects the task) once the
    /// processor has been destroyed.
    pub fn add_task(
        &self,
        task: ScheduledTask,
        executor: Arc<dyn BatchExecutor>,
    ) -> SyncResult<BatchAdd> {
        if self.inner.closed.load(Ordering::Acquire) {
            task.reject(TaskStatus::Cancelled, SyncError::ShuttingDown);
            return Err(SyncError::ShuttingDown);
        }

        let priority = task.priority;
        let task_id = task.id.clone();
        let mut lanes = self.inner.lanes.lock();
        let lane = lanes.entry(priority).or_default();
        lane.tasks.push(task);
        lane.executor = Some(executor.clone());

        let lane_len = lane.tasks.len();
        debug!(task_id = %task_id, priority = %priority, lane_len, "Task added to batch");

        if lane_len >= self.inner.config.max_batch_size {
            if let Some(timer) = lane.timer.take() {
                timer.abort();
            }
            let batch = lane.take();
            drop(lanes);
            let handle = tokio::spawn(run_batch(priority, batch, executor));
            return Ok(BatchAdd::Flushed(handle));
        }

        if lane.timer.is_none() {
            lane.timer = Some(spawn_timer(
                Arc::downgrade(&self.inner),
                priority,
                lane.generation,
                self.inner.config.max_wait(),
            ));
        }

        Ok(BatchAdd::Queued { lane_len })
    }

    /// Flush every non-empty lane through `executor`, regardless of size or
    /// timers. Lanes run concurrently; the first failure is returned after
    /// all of them finished.
    #[instrument(skip(self, executor))]
    pub async fn flush_all(&self, executor: Arc<dyn BatchExecutor>) -> SyncResult<()> {
        let batches: Vec<_> = {
            let mut lanes = self.inner.lanes.lock();
            Priority::ALL
                .into_iter()
                .filter_map(|priority| {
                    let lane = lanes.get_mut(&priority)?;
                    if let Some(timer) = lane.timer.take() {
                        timer.abort();
                    }
                    let batch = lane.take();
                    (!batch.is_empty()).then_some((priority, batch))
                })
                .collect()
        };

        let results = join_all(
            batches
                .into_iter()
                .map(|(priority, batch)| run_batch(priority, batch, executor.clone())),
        )
        .await;

        results.into_iter().collect()
    }

    pub fn status(&self) -> BatchStatus {
        let lanes = self.inner.lanes.lock();
        let len = |priority: Priority| lanes.get(&priority).map_or(0, |lane| lane.tasks.len());
        BatchStatus {
            high: len(Priority::High),
            normal: len(Priority::Normal),
            low: len(Priority::Low),
        }
    }

    /// Abort timers and reject every batched task. Later adds are refused.
    pub fn destroy(&self) {
        self.inner.closed.store(true, Ordering::Release);
        let drained: Vec<_> = {
            let mut lanes = self.inner.lanes.lock();
            lanes
                .drain()
                .flat_map(|(_, mut lane)| {
                    if let Some(timer) = lane.timer.take() {
                        timer.abort();
                    }
                    lane.tasks
                })
                .collect()
        };

        let count = drained.len();
        for task in drained {
            task.reject(TaskStatus::Cancelled, SyncError::ShuttingDown);
        }
        info!(count, "Batch processor destroyed");
    }
}

fn spawn_timer(
    inner: Weak<Inner>,
    priority: Priority,
    generation: u64,
    wait: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(wait).await;
        let Some(inner) = inner.upgrade() else {
            return;
        };

        let flush = {
            let mut lanes = inner.lanes.lock();
            let Some(lane) = lanes.get_mut(&priority) else {
                return;
            };
            if lane.generation != generation {
                return;
            }
            // Dropping our own handle detaches it; aborting would cancel this flush
            lane.timer = None;
            let executor = lane.executor.clone();
            let batch = lane.take();
            executor.map(|executor| (batch, executor))
        };

        if let Some((batch, executor)) = flush {
            // Failures are already logged by run_batch
            let _ = run_batch(priority, batch, executor).await;
        }
    })
}

async fn run_batch(
    priority: Priority,
    batch: Vec<ScheduledTask>,
    executor: Arc<dyn BatchExecutor>,
) -> SyncResult<()> {
    if batch.is_empty() {
        return Ok(());
    }

    let count = batch.len();
    info!(priority = %priority, count, "Processing batch");
    match executor.execute(batch).await {
        Ok(()) => {
            info!(priority = %priority, count, "Batch processed");
            Ok(())
        }
        Err(e) => {
            error!(priority = %priority, count, error = %e, "Batch processing failed");
            Err(e)
        }
    }
}
