//! Priority task queue with bounded in-flight execution

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info, instrument};
use versesync_common::Clock;
use versesync_domain::{DomainError, PersistedTaskRecord, Priority, TaskId, TaskStatus};

use super::task::ScheduledTask;
use crate::sync::errors::{SyncError, SyncResult};

/// Ordering key: priority, then creation time, then insertion sequence.
type QueueKey = (Priority, DateTime<Utc>, u64);

#[derive(Default)]
struct QueueState {
    pending: BTreeMap<QueueKey, ScheduledTask>,
    index: HashMap<TaskId, QueueKey>,
    processing: HashSet<TaskId>,
    /// Tasks waiting out a retry delay, kept in persistable form
    retrying: HashMap<TaskId, PersistedTaskRecord>,
    sequence: u64,
}

impl QueueState {
    fn insert(&mut self, task: ScheduledTask) {
        let key = (task.priority, task.created_at, self.sequence);
        self.sequence += 1;
        self.index.insert(task.id.clone(), key);
        self.pending.insert(key, task);
    }
}

/// Pending/in-flight counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStatus {
    pub pending: usize,
    pub processing: usize,
    /// Waiting for a retry delay to elapse
    pub retrying: usize,
}

/// In-memory priority queue.
///
/// Strict priority ordering with FIFO tie-break on creation time. A task
/// handed out by [`TaskQueue::dequeue`] counts against the concurrency cap
/// until [`TaskQueue::complete`], [`TaskQueue::fail`] or
/// [`TaskQueue::defer`] is called for it. A deferred task stays part of the
/// pending set until [`TaskQueue::resume`] puts it back in line.
pub struct TaskQueue {
    state: Mutex<QueueState>,
    max_concurrent: usize,
    clock: Arc<dyn Clock>,
}

impl TaskQueue {
    pub fn new(max_concurrent: usize, clock: Arc<dyn Clock>) -> Self {
        Self { state: Mutex::new(QueueState::default()), max_concurrent, clock }
    }

    /// Insert a pending task.
    ///
    /// # Errors
    /// Rejects tasks that are not pending or whose id is already queued
    /// or in flight.
    #[instrument(skip(self, task), fields(task_id = %task.id, priority = %task.priority))]
    pub fn enqueue(&self, task: ScheduledTask) -> SyncResult<()> {
        if task.status() != TaskStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: task.status().to_string(),
                to: TaskStatus::Pending.to_string(),
            }
            .into());
        }

        let mut state = self.state.lock();
        if state.index.contains_key(&task.id)
            || state.processing.contains(&task.id)
            || state.retrying.contains_key(&task.id)
        {
            let message = format!("task {} already queued", task.id);
            return Err(DomainError::InvalidInput(message).into());
        }

        state.insert(task);
        debug!(pending = state.pending.len(), "Task enqueued");
        Ok(())
    }

    /// Pop the head task and mark it processing.
    ///
    /// Returns `None` when the queue is empty or the in-flight cap is
    /// reached.
    pub fn dequeue(&self) -> SyncResult<Option<ScheduledTask>> {
        let mut state = self.state.lock();
        if state.processing.len() >= self.max_concurrent {
            return Ok(None);
        }

        let Some((_, mut task)) = state.pending.pop_first() else {
            return Ok(None);
        };
        state.index.remove(&task.id);

        task.transition(TaskStatus::Processing)?;
        task.started_at = Some(DateTime::<Utc>::from(self.clock.system_time()));
        state.processing.insert(task.id.clone());

        debug!(task_id = %task.id, in_flight = state.processing.len(), "Task dequeued");
        Ok(Some(task))
    }

    /// Remove a finished task from the in-flight set
    pub fn complete(&self, id: &TaskId) -> bool {
        self.state.lock().processing.remove(id)
    }

    /// Remove a permanently failed task from the in-flight set
    pub fn fail(&self, id: &TaskId) -> bool {
        self.state.lock().processing.remove(id)
    }

    /// Free the in-flight slot of a task that will be retried, keeping its
    /// record in the pending set while the retry delay runs.
    ///
    /// # Errors
    /// Fails when the payload cannot be serialized.
    pub fn defer(&self, task: &ScheduledTask) -> SyncResult<()> {
        let mut record = task.to_record()?;
        record.status = TaskStatus::Pending;

        let mut state = self.state.lock();
        state.processing.remove(&task.id);
        state.retrying.insert(task.id.clone(), record);
        Ok(())
    }

    /// Put a deferred task back in line.
    ///
    /// A task cancelled or cleared during its delay is rejected instead;
    /// returns whether it was queued.
    ///
    /// # Errors
    /// Rejects tasks that are not pending.
    pub fn resume(&self, task: ScheduledTask) -> SyncResult<bool> {
        if task.status() != TaskStatus::Pending {
            return Err(DomainError::InvalidTransition {
                from: task.status().to_string(),
                to: TaskStatus::Pending.to_string(),
            }
            .into());
        }

        let mut state = self.state.lock();
        if state.retrying.remove(&task.id).is_none() {
            drop(state);
            let task_id = task.id.clone();
            debug!(task_id = %task_id, "Deferred task dropped before retry");
            task.reject(TaskStatus::Cancelled, SyncError::Cancelled { task_id });
            return Ok(false);
        }

        state.insert(task);
        debug!(pending = state.pending.len(), "Deferred task requeued");
        Ok(true)
    }

    /// Cancel a still-pending task and reject its waiter.
    ///
    /// A deferred task is dropped from the pending set at once; its waiter is
    /// rejected when the retry delay ends.
    ///
    /// # Errors
    /// In-flight tasks cannot be cancelled; unknown ids are reported.
    #[instrument(skip(self))]
    pub fn cancel(&self, id: &TaskId) -> SyncResult<()> {
        let mut state = self.state.lock();
        if state.retrying.remove(id).is_some() {
            info!(task_id = %id, "Deferred task cancelled");
            return Ok(());
        }
        let Some(key) = state.index.remove(id) else {
            if state.processing.contains(id) {
                return Err(DomainError::InvalidTransition {
                    from: TaskStatus::Processing.to_string(),
                    to: TaskStatus::Cancelled.to_string(),
                }
                .into());
            }
            return Err(SyncError::UnknownTask(id.clone()));
        };

        let task = state.pending.remove(&key);
        drop(state);

        if let Some(task) = task {
            task.reject(TaskStatus::Cancelled, SyncError::Cancelled { task_id: id.clone() });
            info!(task_id = %id, "Task cancelled");
        }
        Ok(())
    }

    /// Reject and drop every pending task; forget in-flight ids.
    pub fn clear(&self) -> usize {
        let drained = {
            let mut state = self.state.lock();
            state.index.clear();
            state.processing.clear();
            state.retrying.clear();
            std::mem::take(&mut state.pending)
        };

        let count = drained.len();
        for task in drained.into_values() {
            let task_id = task.id.clone();
            task.reject(TaskStatus::Cancelled, SyncError::QueueCleared { task_id });
        }

        info!(count, "Task queue cleared");
        count
    }

    /// Persistable form of every pending task, deferred ones included, in
    /// dequeue order
    pub fn pending_records(&self) -> SyncResult<Vec<PersistedTaskRecord>> {
        let state = self.state.lock();
        let mut records = state
            .pending
            .values()
            .map(|task| task.to_record().map_err(SyncError::from))
            .collect::<SyncResult<Vec<_>>>()?;
        records.extend(state.retrying.values().cloned());
        records.sort_by_key(|record| (record.priority, record.created_at));
        Ok(records)
    }

    pub fn status(&self) -> QueueStatus {
        let state = self.state.lock();
        QueueStatus {
            pending: state.pending.len(),
            processing: state.processing.len(),
            retrying: state.retrying.len(),
        }
    }

    /// Whether `id` is pending, deferred or in flight
    pub fn contains(&self, id: &TaskId) -> bool {
        let state = self.state.lock();
        state.index.contains_key(id)
            || state.processing.contains(id)
            || state.retrying.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().pending.is_empty()
    }
}
