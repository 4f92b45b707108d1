//! Remote store adapters

mod rest;

pub use rest::{status_error, transport_error, RestRemoteStore, RestRemoteStoreBuilder};
