//! Engine configuration structures

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::errors::{DomainError, Result};
use crate::impl_domain_status_conversions;

/// Language of user-facing error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    En,
    #[default]
    Ko,
}

impl_domain_status_conversions!(Locale {
    En => "en",
    Ko => "ko",
});

/// Batch window settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Lane size that triggers an immediate flush
    pub max_batch_size: usize,
    /// Longest a non-full lane waits before flushing
    pub max_wait_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { max_batch_size: DEFAULT_MAX_BATCH_SIZE, max_wait_ms: DEFAULT_BATCH_MAX_WAIT_MS }
    }
}

impl BatchConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Offline queue persistence settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    pub storage_key: String,
    pub max_entries: usize,
    /// Records older than this are dropped on load
    pub max_age_secs: u64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            storage_key: OFFLINE_QUEUE_STORAGE_KEY.to_string(),
            max_entries: DEFAULT_OFFLINE_MAX_ENTRIES,
            max_age_secs: DEFAULT_OFFLINE_MAX_AGE_SECS,
        }
    }
}

impl OfflineConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// Configuration for the sync engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Scheduling loop period
    pub tick_interval_ms: u64,
    /// In-flight task cap
    pub max_concurrent: usize,
    /// Retry budget for tasks created without an explicit one
    pub default_max_retries: u32,
    pub notifications_enabled: bool,
    pub locale: Locale,
    pub batch: BatchConfig,
    pub offline: OfflineConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            default_max_retries: DEFAULT_TASK_MAX_RETRIES,
            notifications_enabled: true,
            locale: Locale::default(),
            batch: BatchConfig::default(),
            offline: OfflineConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Reject settings the engine cannot run with.
    ///
    /// # Errors
    /// Returns `DomainError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(DomainError::Config("tick_interval_ms must be greater than 0".into()));
        }
        if self.max_concurrent == 0 {
            return Err(DomainError::Config("max_concurrent must be greater than 0".into()));
        }
        if self.batch.max_batch_size == 0 {
            return Err(DomainError::Config("batch.max_batch_size must be greater than 0".into()));
        }
        if self.offline.max_entries == 0 {
            return Err(DomainError::Config("offline.max_entries must be greater than 0".into()));
        }
        if self.offline.max_age_secs == 0 {
            return Err(DomainError::Config("offline.max_age_secs must be greater than 0".into()));
        }
        if self.offline.storage_key.trim().is_empty() {
            return Err(DomainError::Config("offline.storage_key must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_constants() {
        let config = SyncConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.batch.max_batch_size, 10);
        assert_eq!(config.batch.max_wait(), Duration::from_secs(1));
        assert_eq!(config.offline.storage_key, "sync-offline-queue");
        assert_eq!(config.offline.max_entries, 100);
        assert_eq!(config.offline.max_age(), Duration::from_secs(86_400));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let config = SyncConfig { max_concurrent: 0, ..SyncConfig::default() };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DomainError::Config(msg) if msg.contains("max_concurrent")));
    }

    #[test]
    fn validate_rejects_blank_storage_key() {
        let mut config = SyncConfig::default();
        config.offline.storage_key = "  ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"max_concurrent":5,"batch":{"max_wait_ms":250}}"#).unwrap();
        assert_eq!(config.max_concurrent, 5);
        assert_eq!(config.batch.max_wait_ms, 250);
        assert_eq!(config.batch.max_batch_size, 10);
        assert_eq!(config.locale, Locale::Ko);
    }
}
