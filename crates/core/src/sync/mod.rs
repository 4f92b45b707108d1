//! Offline sync engine components, leaves first.

pub mod activity;
pub mod batch;
pub mod dispatch;
pub mod error_handler;
pub mod errors;
pub mod manager;
pub mod mutation;
pub mod network;
pub mod ports;
pub mod queue;
pub mod realtime;
