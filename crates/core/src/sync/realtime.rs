//! Realtime change subscriptions with self-event suppression

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use versesync_domain::{ChangeEvent, EventFilter};

use super::errors::SyncResult;
use super::ports::{ChangeHandler, ChannelHandle, ChannelSpec, RealtimeTransport};

/// One channel subscription requested by the UI
#[derive(Clone)]
pub struct RealtimeSubscription {
    pub channel: String,
    pub table: String,
    pub event: EventFilter,
    pub handler: ChangeHandler,
}

impl std::fmt::Debug for RealtimeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeSubscription")
            .field("channel", &self.channel)
            .field("table", &self.table)
            .field("event", &self.event)
            .finish_non_exhaustive()
    }
}

pub struct RealtimeSubscriber {
    transport: Arc<dyn RealtimeTransport>,
    current_user: Arc<RwLock<Option<String>>>,
    channels: Mutex<HashMap<String, Box<dyn ChannelHandle>>>,
}

impl RealtimeSubscriber {
    pub fn new(transport: Arc<dyn RealtimeTransport>) -> Self {
        Self {
            transport,
            current_user: Arc::new(RwLock::new(None)),
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Set the local actor whose own changes are suppressed
    pub fn set_current_user_id(&self, user_id: Option<String>) {
        *self.current_user.write() = user_id;
    }

    /// Whether `event` was caused by the current user
    pub fn is_own_request(&self, event: &ChangeEvent) -> bool {
        is_own(&self.current_user, event)
    }

    /// Open a channel for `subscription`.
    ///
    /// A channel already open under the same name is closed first. Events
    /// for other tables or event types and self-originated events never
    /// reach the handler.
    #[instrument(
        skip(self, subscription),
        fields(channel = %subscription.channel, table = %subscription.table)
    )]
    pub async fn subscribe(&self, subscription: RealtimeSubscription) -> SyncResult<()> {
        self.unsubscribe(&subscription.channel).await;

        let RealtimeSubscription { channel, table, event: filter, handler } = subscription;
        let current_user = self.current_user.clone();
        let target = table.clone();
        let sink: ChangeHandler = Arc::new(move |event: ChangeEvent| {
            if event.table != target || !filter.matches(event.event_type) {
                return;
            }
            if is_own(&current_user, &event) {
                debug!(table = %event.table, "Suppressed self-originated change");
                return;
            }
            handler(event);
        });

        let spec = ChannelSpec { name: channel.clone(), table, filter };
        let handle = self.transport.open_channel(spec, sink).await?;

        let replaced = self.channels.lock().insert(channel.clone(), handle);
        if let Some(replaced) = replaced {
            replaced.close().await;
        }
        info!(channel = %channel, "Realtime channel subscribed");
        Ok(())
    }

    /// Close one channel; unknown names are ignored
    pub async fn unsubscribe(&self, channel: &str) {
        let handle = self.channels.lock().remove(channel);
        if let Some(handle) = handle {
            handle.close().await;
            info!(channel, "Realtime channel unsubscribed");
        }
    }

    pub async fn unsubscribe_all(&self) {
        let handles: Vec<_> = self.channels.lock().drain().collect();
        for (_, handle) in &handles {
            handle.close().await;
        }
        if !handles.is_empty() {
            info!(count = handles.len(), "All realtime channels unsubscribed");
        }
    }

    /// Names of the open channels, sorted
    pub fn channels(&self) -> Vec<String> {
        let mut names: Vec<_> = self.channels.lock().keys().cloned().collect();
        names.sort();
        names
    }
}

fn is_own(current_user: &RwLock<Option<String>>, event: &ChangeEvent) -> bool {
    match (current_user.read().as_deref(), event.actor_id()) {
        (Some(me), Some(actor)) => me == actor,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;
    use versesync_domain::ChangeEventType;

    use super::*;

    #[derive(Default)]
    struct FakeTransport {
        sinks: Mutex<HashMap<String, ChangeHandler>>,
        closed: Arc<AtomicUsize>,
    }

    struct FakeHandle {
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChannelHandle for FakeHandle {
        async fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl RealtimeTransport for FakeTransport {
        async fn open_channel(
            &self,
            spec: ChannelSpec,
            sink: ChangeHandler,
        ) -> SyncResult<Box<dyn ChannelHandle>> {
            self.sinks.lock().insert(spec.name, sink);
            Ok(Box::new(FakeHandle { closed: self.closed.clone() }))
        }
    }

    impl FakeTransport {
        fn push(&self, channel: &str, event: ChangeEvent) {
            let sink = self.sinks.lock().get(channel).cloned();
            if let Some(sink) = sink {
                sink(event);
            }
        }
    }

    fn insert(table: &str, user: &str) -> ChangeEvent {
        ChangeEvent {
            table: table.into(),
            event_type: ChangeEventType::Insert,
            new: Some(json!({"id": 1, "user_id": user})),
            old: None,
        }
    }

    fn counting(filter: EventFilter) -> (RealtimeSubscription, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let subscription = RealtimeSubscription {
            channel: "comments-feed".into(),
            table: "comments".into(),
            event: filter,
            handler: Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        };
        (subscription, hits)
    }

    /// Validates self-event suppression.
    ///
    /// Assertions:
    /// - An event by the current user never reaches the handler.
    /// - An event by another user is delivered exactly once.
    #[tokio::test]
    async fn test_own_events_are_suppressed() {
        let transport = Arc::new(FakeTransport::default());
        let subscriber = RealtimeSubscriber::new(transport.clone());
        subscriber.set_current_user_id(Some("me".into()));
        let (subscription, hits) = counting(EventFilter::Any);
        subscriber.subscribe(subscription).await.unwrap();

        transport.push("comments-feed", insert("comments", "me"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        transport.push("comments-feed", insert("comments", "someone-else"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_without_current_user_everything_is_foreign() {
        let transport = Arc::new(FakeTransport::default());
        let subscriber = RealtimeSubscriber::new(transport.clone());
        let (subscription, hits) = counting(EventFilter::Any);
        subscriber.subscribe(subscription).await.unwrap();

        transport.push("comments-feed", insert("comments", "me"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!subscriber.is_own_request(&insert("comments", "me")));
    }

    #[tokio::test]
    async fn test_table_and_event_filters_apply() {
        let transport = Arc::new(FakeTransport::default());
        let subscriber = RealtimeSubscriber::new(transport.clone());
        let (subscription, hits) = counting(EventFilter::Delete);
        subscriber.subscribe(subscription).await.unwrap();

        transport.push("comments-feed", insert("comments", "a"));
        transport.push("comments-feed", ChangeEvent { table: "posts".into(), ..delete("a") });
        transport.push("comments-feed", delete("a"));

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    fn delete(user: &str) -> ChangeEvent {
        ChangeEvent {
            table: "comments".into(),
            event_type: ChangeEventType::Delete,
            new: None,
            old: Some(json!({"user_id": user})),
        }
    }

    /// Validates channel bookkeeping: replacement, unsubscribe and
    /// idempotent teardown.
    #[tokio::test]
    async fn test_channel_lifecycle() {
        let transport = Arc::new(FakeTransport::default());
        let subscriber = RealtimeSubscriber::new(transport.clone());

        subscriber.subscribe(counting(EventFilter::Any).0).await.unwrap();
        subscriber.subscribe(counting(EventFilter::Any).0).await.unwrap();
        assert_eq!(subscriber.channels(), ["comments-feed"]);
        assert_eq!(transport.closed.load(Ordering::SeqCst), 1);

        subscriber.unsubscribe("comments-feed").await;
        subscriber.unsubscribe("comments-feed").await;
        assert!(subscriber.channels().is_empty());
        assert_eq!(transport.closed.load(Ordering::SeqCst), 2);

        subscriber.unsubscribe_all().await;
        assert_eq!(transport.closed.load(Ordering::SeqCst), 2);
    }
}
