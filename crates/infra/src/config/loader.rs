//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read the given file, or search the standard locations for one
//! 2. Fall back to `SyncConfig::default()` when no file exists
//! 3. Apply `VERSESYNC_*` environment overrides
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `VERSESYNC_TICK_INTERVAL_MS`: scheduling loop period
//! - `VERSESYNC_MAX_CONCURRENT`: in-flight task cap
//! - `VERSESYNC_DEFAULT_MAX_RETRIES`: retry budget for new tasks
//! - `VERSESYNC_BATCH_SIZE`: lane size that triggers a flush
//! - `VERSESYNC_BATCH_WAIT_MS`: batch window
//! - `VERSESYNC_OFFLINE_MAX_ENTRIES`: offline queue capacity
//! - `VERSESYNC_OFFLINE_MAX_AGE_SECS`: offline record lifetime
//! - `VERSESYNC_OFFLINE_STORAGE_KEY`: key under which the queue is stored
//! - `VERSESYNC_NOTIFICATIONS`: whether failures notify the user (true/false)
//! - `VERSESYNC_LOCALE`: `en` or `ko`
//!
//! ## File Locations
//! Searched in order: `./versesync.{toml,json}`, `./config.{toml,json}`, then
//! the same names next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};
use versesync_common::CommonError;
pub use versesync_domain::constants::ENV_PREFIX;
use versesync_domain::{Locale, SyncConfig};

use crate::errors::InfraResult;

const CONFIG_FILE_NAMES: &[&str] =
    &["versesync.toml", "versesync.json", "config.toml", "config.json"];

/// Load configuration with file, defaults and environment layering.
///
/// # Errors
/// Returns an error if the given file is missing or malformed, an override
/// cannot be parsed, or the final configuration fails validation.
pub fn load(path: Option<PathBuf>) -> InfraResult<SyncConfig> {
    let config = match path.or_else(find_config_path) {
        Some(path) => load_from_file(&path)?,
        None => {
            debug!("No config file found, using defaults");
            SyncConfig::default()
        }
    };

    let config = apply_overrides(config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file; format is picked by extension.
///
/// # Errors
/// Returns `CommonError::Config` if the file is missing, unreadable or of
/// an unsupported format, and a serialization error if parsing fails.
pub fn load_from_file(path: &Path) -> InfraResult<SyncConfig> {
    if !path.exists() {
        return Err(
            CommonError::config(format!("Config file not found: {}", path.display())).into()
        );
    }

    info!(path = %path.display(), "Loading configuration from file");
    let contents = std::fs::read_to_string(path).map_err(|e| {
        CommonError::config(format!("Failed to read config file {}: {e}", path.display()))
    })?;

    parse_config(&contents, path)
}

fn parse_config(contents: &str, path: &Path) -> InfraResult<SyncConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(CommonError::from)?),
        "json" => Ok(serde_json::from_str(contents)?),
        other => Err(CommonError::config(format!("Unsupported config format: {other}")).into()),
    }
}

/// First existing config file among the standard locations
pub fn find_config_path() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `VERSESYNC_*` overrides read through `lookup`.
///
/// `lookup` receives the full variable name; `load` passes the process
/// environment.
///
/// # Errors
/// Returns `CommonError::Config` naming the variable whose value does not
/// parse.
pub fn apply_overrides<F>(mut config: SyncConfig, lookup: F) -> InfraResult<SyncConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(v) = parsed(&var, "TICK_INTERVAL_MS")? {
        config.tick_interval_ms = v;
    }
    if let Some(v) = parsed(&var, "MAX_CONCURRENT")? {
        config.max_concurrent = v;
    }
    if let Some(v) = parsed(&var, "DEFAULT_MAX_RETRIES")? {
        config.default_max_retries = v;
    }
    if let Some(v) = parsed(&var, "BATCH_SIZE")? {
        config.batch.max_batch_size = v;
    }
    if let Some(v) = parsed(&var, "BATCH_WAIT_MS")? {
        config.batch.max_wait_ms = v;
    }
    if let Some(v) = parsed(&var, "OFFLINE_MAX_ENTRIES")? {
        config.offline.max_entries = v;
    }
    if let Some(v) = parsed(&var, "OFFLINE_MAX_AGE_SECS")? {
        config.offline.max_age_secs = v;
    }
    if let Some(v) = var("OFFLINE_STORAGE_KEY") {
        config.offline.storage_key = v;
    }
    if let Some(v) = var("NOTIFICATIONS") {
        config.notifications_enabled = parse_bool(&v);
    }
    if let Some(v) = parsed::<Locale, _>(&var, "LOCALE")? {
        config.locale = v;
    }

    Ok(config)
}

fn parsed<T, F>(var: &F, name: &str) -> InfraResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = var(name) else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|e| {
        let field = format!("{ENV_PREFIX}{name}");
        CommonError::config_field(field, format!("invalid value '{raw}': {e}")).into()
    })
}

/// Accepts `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
