//! Domain data types for the sync engine

pub mod network;
pub mod operation;
pub mod realtime;
pub mod state;
pub mod task;

pub use network::{Connectivity, NetworkStatus};
pub use operation::{
    CacheKey, CommentPayload, DeletePayload, LikePayload, OperationKind, PostPayload,
    RefreshPayload, SyncOperation, UpdatePayload,
};
pub use realtime::{ChangeEvent, ChangeEventType, EventFilter};
pub use state::SyncState;
pub use task::{PersistedTaskRecord, Priority, TaskId, TaskStatus};
