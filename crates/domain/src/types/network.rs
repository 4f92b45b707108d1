//! Connectivity types

use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Network status as seen by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl_domain_status_conversions!(NetworkStatus {
    Online => "online",
    Offline => "offline",
    Unknown => "unknown",
});

/// Raw platform connectivity reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Connectivity {
    pub is_connected: bool,
    pub is_internet_reachable: bool,
}

impl Connectivity {
    pub const ONLINE: Self = Self { is_connected: true, is_internet_reachable: true };
    pub const OFFLINE: Self = Self { is_connected: false, is_internet_reachable: false };

    /// Online only when connected and the internet is reachable.
    pub fn status(self) -> NetworkStatus {
        if self.is_connected && self.is_internet_reachable {
            NetworkStatus::Online
        } else {
            NetworkStatus::Offline
        }
    }
}
