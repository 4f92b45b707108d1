//! Connectivity relay
//!
//! Seeds its status from a [`ConnectivitySource`] and rebroadcasts every
//! change to registered listeners. Repeated readings with the same status are
//! not rebroadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use versesync_domain::{Connectivity, NetworkStatus};

use super::ports::ConnectivitySource;

/// Callback invoked with every status change
pub type StatusListener = Arc<dyn Fn(NetworkStatus) + Send + Sync>;

struct Inner {
    status: watch::Sender<NetworkStatus>,
    listeners: Mutex<HashMap<u64, StatusListener>>,
    next_id: AtomicU64,
    relay: Mutex<Option<JoinHandle<()>>>,
}

#[derive(Clone)]
pub struct NetworkMonitor {
    inner: Arc<Inner>,
}

impl Default for NetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkMonitor {
    /// Monitor in the `Unknown` state with no source attached
    pub fn new() -> Self {
        let (status, _) = watch::channel(NetworkStatus::Unknown);
        Self {
            inner: Arc::new(Inner {
                status,
                listeners: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                relay: Mutex::new(None),
            }),
        }
    }

    /// Seed from `source` and relay its future readings.
    ///
    /// Replaces any relay started earlier.
    pub fn start(&self, source: Arc<dyn ConnectivitySource>) {
        let mut readings = source.watch();
        self.apply(source.current());

        let monitor = Arc::downgrade(&self.inner);
        let relay = tokio::spawn(async move {
            while readings.changed().await.is_ok() {
                let reading = *readings.borrow_and_update();
                let Some(inner) = monitor.upgrade() else {
                    break;
                };
                NetworkMonitor { inner }.apply(reading);
            }
            debug!("Connectivity source closed");
        });

        if let Some(previous) = self.inner.relay.lock().replace(relay) {
            previous.abort();
        }
    }

    /// Feed one connectivity reading
    pub fn apply(&self, reading: Connectivity) {
        let status = reading.status();
        let changed = self.inner.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if !changed {
            return;
        }

        info!(status = %status, "Network status changed");
        let listeners: Vec<_> = self.inner.listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(status);
        }
    }

    /// Register `listener`; it is called right away with the current status
    /// and then on every change until the returned guard is dropped.
    #[must_use = "dropping the subscription unsubscribes the listener"]
    pub fn subscribe(&self, listener: StatusListener) -> NetworkSubscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.listeners.lock().insert(id, listener.clone());
        listener(self.status());
        NetworkSubscription { id, monitor: Arc::downgrade(&self.inner) }
    }

    pub fn status(&self) -> NetworkStatus {
        *self.inner.status.borrow()
    }

    pub fn is_online(&self) -> bool {
        self.status() == NetworkStatus::Online
    }

    /// True only for a known offline state; `Unknown` is not offline.
    pub fn is_offline(&self) -> bool {
        self.status() == NetworkStatus::Offline
    }

    /// Receiver observing every status change
    pub fn watch(&self) -> watch::Receiver<NetworkStatus> {
        self.inner.status.subscribe()
    }

    /// Stop relaying and drop all listeners
    pub fn stop(&self) {
        if let Some(relay) = self.inner.relay.lock().take() {
            relay.abort();
        }
        self.inner.listeners.lock().clear();
    }
}

/// Listener registration; unsubscribes on drop
#[derive(Debug)]
pub struct NetworkSubscription {
    id: u64,
    monitor: Weak<Inner>,
}

impl NetworkSubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for NetworkSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.monitor.upgrade() {
            inner.listeners.lock().remove(&self.id);
        }
    }
}
