// Operation execution against the remote and cache ports
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;
use versesync_domain::{RemoteError, SyncOperation};

use super::ports::{CacheStore, RemoteStore};

pub struct OperationDispatcher {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<dyn CacheStore>,
}

impl OperationDispatcher {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<dyn CacheStore>) -> Self {
        Self { remote, cache }
    }

    /// Perform one operation. Refreshes only touch the local cache.
    pub async fn execute(&self, operation: &SyncOperation) -> Result<(), RemoteError> {
        debug!(operation = %operation.kind(), "Dispatching operation");
        match operation {
            SyncOperation::Like(payload) => self.remote.toggle_like(payload).await,
            SyncOperation::Comment(payload) => self.remote.create_comment(payload).await,
            SyncOperation::Post(payload) => self.remote.create_post(payload).await,
            SyncOperation::Delete(payload) => self.remote.delete_record(payload).await,
            SyncOperation::Update(payload) => self.remote.update_record(payload).await,
            SyncOperation::Refresh(payload) => {
                join_all(payload.cache_keys.iter().map(|key| self.cache.invalidate(key))).await;
                Ok(())
            }
        }
    }
}
