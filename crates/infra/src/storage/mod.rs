//! Key-value stores backing the offline queue
//!
//! - [`FileKeyValueStore`]: one file per key, atomic replace on write
//! - [`MemoryKeyValueStore`]: process-local map for tests and ephemeral runs

mod file;
mod memory;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;
