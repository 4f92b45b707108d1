//! Optimistic mutations with rollback and bounded retry

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, instrument, warn};
use uuid::Uuid;
use versesync_domain::constants::DEFAULT_MUTATION_RETRY_DELAY_MS;
use versesync_domain::{CacheKey, RemoteError};

use super::error_handler::{ErrorContext, ErrorHandler, ProcessedError};
use super::errors::{SyncError, SyncResult};
use super::ports::CacheStore;

type OptimisticUpdate = Box<dyn FnOnce(Option<Value>) -> Value + Send>;
type SuccessHook<T> = Box<dyn FnOnce(&T) + Send>;
type ErrorHook = Box<dyn FnOnce(&ProcessedError) + Send>;

/// Retry budget for one mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRetry {
    /// Extra attempts after the first; `0` disables retrying
    pub max_retries: u32,
    /// Linear floor: attempt `n` waits at least `retry_delay * (n + 1)`
    pub retry_delay: Duration,
}

impl Default for MutationRetry {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay: Duration::from_millis(DEFAULT_MUTATION_RETRY_DELAY_MS),
        }
    }
}

/// Hooks and retry settings for [`MutationSyncManager::execute_mutation`]
pub struct MutationConfig<T> {
    optimistic_update: Option<OptimisticUpdate>,
    on_success: Option<SuccessHook<T>>,
    on_error: Option<ErrorHook>,
    retry: MutationRetry,
}

impl<T> Default for MutationConfig<T> {
    fn default() -> Self {
        Self {
            optimistic_update: None,
            on_success: None,
            on_error: None,
            retry: MutationRetry::default(),
        }
    }
}

impl<T> MutationConfig<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transform applied to the cached value before the remote call
    #[must_use]
    pub fn optimistic_update(
        mut self,
        update: impl FnOnce(Option<Value>) -> Value + Send + 'static,
    ) -> Self {
        self.optimistic_update = Some(Box::new(update));
        self
    }

    #[must_use]
    pub fn on_success(mut self, hook: impl FnOnce(&T) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(hook));
        self
    }

    /// Replaces the default user notification on permanent failure
    #[must_use]
    pub fn on_error(mut self, hook: impl FnOnce(&ProcessedError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(hook));
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: MutationRetry) -> Self {
        self.retry = retry;
        self
    }
}

/// How to reconcile a server value with a local one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    #[default]
    ServerWins,
    ClientWins,
    /// Shallow object merge, server fields win
    Merge,
}

pub fn resolve_conflict(server: Value, local: Value, strategy: ConflictStrategy) -> Value {
    match strategy {
        ConflictStrategy::ServerWins => server,
        ConflictStrategy::ClientWins => local,
        ConflictStrategy::Merge => match (local, server) {
            (Value::Object(mut merged), Value::Object(server)) => {
                merged.extend(server);
                Value::Object(merged)
            }
            (_, server) => server,
        },
    }
}

pub struct MutationSyncManager {
    cache: Arc<dyn CacheStore>,
    errors: Arc<ErrorHandler>,
    // Pre-mutation cache values by mutation id; `None` = nothing was cached
    snapshots: Mutex<HashMap<String, Option<Value>>>,
}

impl MutationSyncManager {
    pub fn new(cache: Arc<dyn CacheStore>, errors: Arc<ErrorHandler>) -> Self {
        Self { cache, errors, snapshots: Mutex::new(HashMap::new()) }
    }

    /// Run `remote_call` for `cache_key` with optimistic update and rollback.
    ///
    /// # Errors
    /// Returns `SyncError::Remote` once the call failed permanently; the
    /// cached value has been restored by then.
    #[instrument(skip(self, cache_key, remote_call, config), fields(cache_key = %cache_key))]
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
        let MutationConfig { optimistic_update, on_success, on_error, retry } = config;
        let mutation_id = format!("{cache_key}-{}", Uuid::now_v7());
        let operation = format!("mutation-{cache_key}");

        if let Some(update) = optimistic_update {
            let previous = self.cache.get(cache_key);
            self.snapshots.lock().insert(mutation_id.clone(), previous.clone());
            self.cache.set(cache_key, update(previous));
        }

        match self.execute_with_retry(remote_call, cache_key, &operation, retry).await {
            Ok(value) => {
                if let Some(hook) = on_success {
                    hook(&value);
                }
                self.errors.record_success(&operation);
                self.snapshots.lock().remove(&mutation_id);
                Ok(value)
            }
            Err(processed) => {
                let snapshot = self.snapshots.lock().remove(&mutation_id);
                match snapshot {
                    Some(Some(previous)) => self.cache.set(cache_key, previous),
                    Some(None) => self.cache.invalidate(cache_key).await,
                    None => {}
                }

                match on_error {
                    Some(hook) => hook(&processed),
                    None => {
                        self.errors.show_notification(&processed);
                    }
                }
                Err(SyncError::from(processed))
            }
        }
    }

    async fn execute_with_retry<T, F, Fut>(
        &self,
        mut remote_call: F,
        cache_key: &CacheKey,
        operation: &str,
        retry: MutationRetry,
    ) -> Result<T, ProcessedError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt = 0;
        loop {
            let error = match remote_call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let context = ErrorContext::new(operation)
                .with_retry_count(attempt)
                .with_payload(json!({ "cacheKey": cache_key.segments() }));
            let processed = self.errors.process_error(&error, context);

            if attempt >= retry.max_retries || !processed.retryable {
                error!(
                    operation,
                    attempt,
                    error_kind = %processed.kind,
                    "Mutation failed permanently"
                );
                return Err(processed);
            }

            let backoff = self.errors.calculate_retry_delay(processed.kind, attempt);
            let delay = backoff.max(retry.retry_delay * (attempt + 1));
            warn!(
                operation,
                attempt = attempt + 1,
                max_retries = retry.max_retries,
                delay_ms = delay.as_millis() as u64,
                error_kind = %processed.kind,
                "Retrying mutation"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
