//! In-memory task representation and its completion handle

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use versesync_domain::{
    DomainError, OperationKind, PersistedTaskRecord, Priority, SyncOperation, TaskId, TaskStatus,
};

use crate::sync::errors::{SyncError, SyncResult};

/// Outcome delivered to a task's waiter on success
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub id: TaskId,
    pub operation: OperationKind,
    pub retry_count: u32,
    pub completed_at: DateTime<Utc>,
}

type Completion = oneshot::Sender<SyncResult<TaskReport>>;

/// Scheduled unit of work
///
/// Owns the completion sender, so it cannot be persisted directly; see
/// [`ScheduledTask::to_record`] and [`ScheduledTask::from_record`]. Tasks
/// restored from storage have no waiter.
#[derive(Debug)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub operation: SyncOperation,
    pub priority: Priority,
    status: TaskStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    completion: Option<Completion>,
}

impl ScheduledTask {
    /// New pending task plus the handle its submitter awaits
    pub fn new(
        operation: SyncOperation,
        priority: Priority,
        max_retries: u32,
        created_at: DateTime<Utc>,
    ) -> (Self, TaskHandle) {
        let id = TaskId::generate(operation.kind());
        let (tx, rx) = oneshot::channel();
        let task = Self {
            id: id.clone(),
            operation,
            priority,
            status: TaskStatus::Pending,
            retry_count: 0,
            max_retries,
            created_at,
            started_at: None,
            completed_at: None,
            error: None,
            completion: Some(tx),
        };
        (task, TaskHandle { id, receiver: rx })
    }

    /// Rebuild a task from its persisted record, without a waiter.
    ///
    /// # Errors
    /// Fails when the payload does not match the operation tag.
    pub fn from_record(record: PersistedTaskRecord) -> Result<Self, DomainError> {
        let operation = SyncOperation::from_parts(record.operation, record.payload)?;
        Ok(Self {
            id: record.id,
            operation,
            priority: record.priority,
            status: TaskStatus::Pending,
            retry_count: record.retry_count,
            max_retries: record.max_retries,
            created_at: record.created_at,
            started_at: None,
            completed_at: None,
            error: None,
            completion: None,
        })
    }

    pub fn to_record(&self) -> serde_json::Result<PersistedTaskRecord> {
        Ok(PersistedTaskRecord {
            id: self.id.clone(),
            operation: self.operation.kind(),
            priority: self.priority,
            status: self.status,
            payload: self.operation.payload_json()?,
            retry_count: self.retry_count,
            max_retries: self.max_retries,
            created_at: self.created_at,
        })
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn has_waiter(&self) -> bool {
        self.completion.is_some()
    }

    /// Move to `next`, rejecting moves the lifecycle does not allow.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTransition`.
    pub fn transition(&mut self, next: TaskStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    /// Mark completed and resolve the waiter
    pub fn resolve(mut self, now: DateTime<Utc>) -> TaskReport {
        self.status = TaskStatus::Completed;
        self.completed_at = Some(now);
        let report = TaskReport {
            id: self.id.clone(),
            operation: self.kind(),
            retry_count: self.retry_count,
            completed_at: now,
        };
        if let Some(tx) = self.completion.take() {
            // Waiter may have dropped its handle
            let _ = tx.send(Ok(report.clone()));
        }
        report
    }

    /// Reject the waiter with `error`, recording its terminal status
    pub fn reject(mut self, status: TaskStatus, error: SyncError) {
        self.status = status;
        self.error = Some(error.to_string());
        if let Some(tx) = self.completion.take() {
            let _ = tx.send(Err(error));
        }
    }
}

/// Awaitable completion of a submitted task
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    receiver: oneshot::Receiver<SyncResult<TaskReport>>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }
}

impl Future for TaskHandle {
    type Output = SyncResult<TaskReport>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => {
                Poll::Ready(Err(SyncError::Abandoned { task_id: this.id.clone() }))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use versesync_domain::LikePayload;

    use super::*;

    fn like() -> SyncOperation {
        SyncOperation::Like(LikePayload { post_id: "p1".into(), liked: true })
    }

    #[tokio::test]
    async fn resolve_delivers_report_to_handle() {
        let (task, handle) = ScheduledTask::new(like(), Priority::High, 3, Utc::now());
        let id = task.id.clone();
        let now = Utc::now();

        task.resolve(now);

        let report = handle.await.unwrap();
        assert_eq!(report.id, id);
        assert_eq!(report.operation, OperationKind::Like);
        assert_eq!(report.completed_at, now);
    }

    #[tokio::test]
    async fn dropped_task_abandons_handle() {
        let (task, handle) = ScheduledTask::new(like(), Priority::Normal, 3, Utc::now());
        drop(task);
        assert!(matches!(handle.await, Err(SyncError::Abandoned { .. })));
    }

    #[test]
    fn record_round_trip_drops_waiter() {
        let (mut task, _handle) = ScheduledTask::new(like(), Priority::Low, 2, Utc::now());
        task.retry_count = 1;

        let record = task.to_record().unwrap();
        assert_eq!(record.payload, json!({"post_id": "p1", "liked": true}));

        let restored = ScheduledTask::from_record(record).unwrap();
        assert_eq!(restored.id, task.id);
        assert_eq!(restored.retry_count, 1);
        assert_eq!(restored.operation, task.operation);
        assert!(!restored.has_waiter());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let (mut task, _handle) = ScheduledTask::new(like(), Priority::Normal, 3, Utc::now());
        assert!(task.transition(TaskStatus::Completed).is_err());
        task.transition(TaskStatus::Processing).unwrap();
        assert!(task.transition(TaskStatus::Cancelled).is_err());
        task.transition(TaskStatus::Pending).unwrap();
    }
}
