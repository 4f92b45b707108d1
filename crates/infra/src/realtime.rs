//! In-process realtime transport
//!
//! Delivers events published through [`LoopbackRealtime::publish`] to every
//! open channel whose table and event filter match. Used for local
//! development and for wiring the engine without a realtime server.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;
use versesync_core::{ChangeHandler, ChannelHandle, ChannelSpec, RealtimeTransport, SyncResult};
use versesync_domain::ChangeEvent;

type Registry = DashMap<u64, (ChannelSpec, ChangeHandler)>;

#[derive(Default)]
pub struct LoopbackRealtime {
    channels: Arc<Registry>,
    next_id: AtomicU64,
}

impl LoopbackRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to matching channels; returns how many received it.
    pub fn publish(&self, event: &ChangeEvent) -> usize {
        let sinks: Vec<ChangeHandler> = self
            .channels
            .iter()
            .filter(|entry| {
                let (spec, _) = entry.value();
                spec.table == event.table && spec.filter.matches(event.event_type)
            })
            .map(|entry| entry.value().1.clone())
            .collect();

        for sink in &sinks {
            sink(event.clone());
        }
        sinks.len()
    }

    pub fn open_channels(&self) -> usize {
        self.channels.len()
    }
}

struct LoopbackChannel {
    id: u64,
    name: String,
    channels: Weak<Registry>,
    closed: AtomicBool,
}

#[async_trait]
impl ChannelHandle for LoopbackChannel {
    async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(channels) = self.channels.upgrade() {
            channels.remove(&self.id);
        }
        debug!(channel = %self.name, "Loopback channel closed");
    }
}

#[async_trait]
impl RealtimeTransport for LoopbackRealtime {
    async fn open_channel(
        &self,
        spec: ChannelSpec,
        sink: ChangeHandler,
    ) -> SyncResult<Box<dyn ChannelHandle>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = spec.name.clone();
        debug!(channel = %name, table = %spec.table, "Loopback channel opened");
        self.channels.insert(id, (spec, sink));

        Ok(Box::new(LoopbackChannel {
            id,
            name,
            channels: Arc::downgrade(&self.channels),
            closed: AtomicBool::new(false),
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;
    use versesync_domain::{ChangeEventType, EventFilter};

    use super::*;

    fn spec(table: &str, filter: EventFilter) -> ChannelSpec {
        ChannelSpec { name: format!("{table}-changes"), table: table.into(), filter }
    }

    fn insert(table: &str) -> ChangeEvent {
        ChangeEvent {
            table: table.into(),
            event_type: ChangeEventType::Insert,
            new: Some(json!({ "id": 1 })),
            old: None,
        }
    }

    /// Validates `LoopbackRealtime::publish` routing by table and filter.
    ///
    /// Assertions:
    /// - Only channels on the event's table with a matching filter receive it.
    /// - Closed channels stop receiving; closing twice is harmless.
    #[tokio::test]
    async fn test_publish_routes_by_table_and_filter() {
        let transport = LoopbackRealtime::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let sink: ChangeHandler = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let comments =
            transport.open_channel(spec("comments", EventFilter::Any), sink.clone()).await.unwrap();
        let _deletes = transport
            .open_channel(spec("comments", EventFilter::Delete), sink.clone())
            .await
            .unwrap();
        let _likes = transport.open_channel(spec("likes", EventFilter::Any), sink).await.unwrap();

        assert_eq!(transport.publish(&insert("comments")), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        comments.close().await;
        comments.close().await;
        assert_eq!(transport.publish(&insert("comments")), 0);
        assert_eq!(transport.open_channels(), 2);
    }
}
