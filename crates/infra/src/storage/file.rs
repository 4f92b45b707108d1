use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};
use versesync_common::{CommonError, CommonResult};
use versesync_core::KeyValueStore;

/// Key-value store keeping each key in its own file under `root`.
///
/// Writes go to a sibling `.tmp` file that is then renamed over the target,
/// so readers never observe a partially written value.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
}

impl FileKeyValueStore {
    /// Store rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding `key`. Characters outside `[A-Za-z0-9_-]` map to `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(format!("{name}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> CommonResult<Option<Vec<u8>>> {
        let path = self.path_for(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CommonError::persistence_op("read", format!("{}: {e}", path.display()))),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> CommonResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            CommonError::persistence_op("create_dir", format!("{}: {e}", self.root.display()))
        })?;
        tokio::fs::write(&tmp, &value)
            .await
            .map_err(|e| CommonError::persistence_op("write", format!("{}: {e}", tmp.display())))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                warn!(path = %tmp.display(), error = %cleanup, "Failed to remove temp file");
            }
            return Err(CommonError::persistence_op("rename", format!("{}: {e}", path.display())));
        }

        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> CommonResult<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(CommonError::persistence_op("remove", format!("{}: {e}", path.display())))
            }
        }
    }
}
