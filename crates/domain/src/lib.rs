//! # VerseSync Domain
//!
//! Data types shared by the offline sync engine.
//!
//! This crate contains:
//! - Task, operation and payload types (in-memory and persisted forms)
//! - Realtime change events and network status
//! - Domain error types and Result definitions
//! - Engine configuration structures
//!
//! ## Architecture
//! - No dependencies on other VerseSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
