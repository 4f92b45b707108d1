//! Configuration loading
//!
//! Reads `SyncConfig` from a TOML or JSON file and layers `VERSESYNC_*`
//! environment overrides on top.

pub mod loader;

pub use loader::{apply_overrides, load, load_from_file, find_config_path, ENV_PREFIX};
