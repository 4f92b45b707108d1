//! Task scheduling: in-memory priority queue and offline persistence

mod offline;
mod task;
mod task_queue;

pub use offline::OfflineQueue;
pub use task::{ScheduledTask, TaskHandle, TaskReport};
pub use task_queue::{QueueStatus, TaskQueue};
