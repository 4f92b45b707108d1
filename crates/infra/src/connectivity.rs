//! Connectivity sources
//!
//! [`WatchConnectivity`] is fed by whatever platform hook reports network
//! changes. [`spawn_reachability_poller`] derives readings by polling an HTTP
//! endpoint instead.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use versesync_core::ConnectivitySource;
use versesync_domain::Connectivity;

/// Connectivity source backed by a `watch` channel
#[derive(Debug)]
pub struct WatchConnectivity {
    tx: watch::Sender<Connectivity>,
}

impl WatchConnectivity {
    pub fn new(initial: Connectivity) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a reading; identical consecutive readings are not republished.
    pub fn report(&self, reading: Connectivity) {
        self.tx.send_if_modified(|current| {
            if *current == reading {
                return false;
            }
            *current = reading;
            true
        });
    }
}

impl Default for WatchConnectivity {
    fn default() -> Self {
        Self::new(Connectivity::OFFLINE)
    }
}

impl ConnectivitySource for WatchConnectivity {
    fn current(&self) -> Connectivity {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<Connectivity> {
        self.tx.subscribe()
    }
}

/// Poll `url` every `interval` and report the outcome to `source`.
///
/// Any HTTP response counts as reachable; connection failures and timeouts
/// count as offline. Runs until `cancel` fires.
pub fn spawn_reachability_poller(
    source: Arc<WatchConnectivity>,
    client: reqwest::Client,
    url: String,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        info!(%url, interval_ms = interval.as_millis() as u64, "Reachability poller started");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let reading = match client.head(&url).send().await {
                Ok(_) => Connectivity::ONLINE,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    debug!(error = %e, "Reachability poller failed");
                    Connectivity::OFFLINE
                }
                Err(e) => {
                    debug!(error = %e, "Reachability poller error, keeping link up");
                    Connectivity { is_connected: true, is_internet_reachable: false }
                }
            };
            source.report(reading);
        }

        debug!("Reachability poller stopped");
    })
}
