//! Rendezvous broker abstraction
//!
//! The hub only needs three verbs from its message bus: subscribe to a
//! topic, publish fire-and-forget, and count active subscribers (the
//! presence check). `MemoryBroker` is the in-process implementation
//! built on `tokio::sync::broadcast` fan-out; a shared broker for
//! multi-replica deployments plugs in behind the same trait.
//!
//! Two topic families exist: a long-lived peer topic per connected
//! identity and an ephemeral call topic per in-flight call. Dropping a
//! [`Subscription`] unsubscribes; topics with no subscribers are
//! garbage-collected.

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::BoxStream;
use futures::Stream;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::error::Result;
use crate::identity::Identity;

/// Long-lived topic delivering incoming calls to a peer's stream sessions
pub fn peer_topic(identity: &Identity) -> String {
    format!("peer-{identity}")
}

/// Single-use topic carrying one response back to a blocked caller
pub fn call_topic(call_id: &str) -> String {
    format!("call-{call_id}")
}

/// Fan-out message bus consumed by the hub.
///
/// Delivery is best-effort and at-most-once; a message published while
/// no subscription is open is lost, which is why presence is checked
/// before publishing.
#[async_trait]
pub trait Broker: Send + Sync + 'static {
    /// Open a subscription on `topic`
    async fn subscribe(&self, topic: &str) -> Result<Subscription>;

    /// Publish `payload` to every current subscriber of `topic`
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()>;

    /// Number of open subscriptions on `topic` (presence check)
    async fn subscriber_count(&self, topic: &str) -> Result<usize>;
}

/// An open topic subscription. Owned exclusively by one session or one
/// in-flight call; dropping it releases the broker-side resources.
pub struct Subscription {
    stream: BoxStream<'static, Bytes>,
}

impl Subscription {
    pub fn new(stream: BoxStream<'static, Bytes>) -> Self {
        Self { stream }
    }

    /// Next message, or `None` once the topic is closed
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.stream.next().await
    }

    pub fn into_stream(self) -> BoxStream<'static, Bytes> {
        self.stream
    }
}

/// Per-topic channel capacity. Payloads are small and low-rate; a slow
/// consumer drops lagged messages rather than buffering without bound.
const TOPIC_CAPACITY: usize = 16;

type TopicTable = DashMap<String, broadcast::Sender<Bytes>>;

/// In-process broker: one broadcast channel per topic.
#[derive(Default)]
pub struct MemoryBroker {
    topics: Arc<TopicTable>,
}

/// Reclaims a topic entry once its last subscription is gone. Travels
/// inside the subscription's stream so every exit path runs it, even
/// when the topic never sees another publish or presence check.
struct TopicGuard {
    topic: String,
    topics: Weak<TopicTable>,
}

impl Drop for TopicGuard {
    fn drop(&mut self) {
        if let Some(topics) = self.topics.upgrade() {
            topics.remove_if(&self.topic, |_, tx| tx.receiver_count() == 0);
        }
    }
}

/// Broadcast messages plus the guard. Field order matters: the inner
/// stream (holding the receiver) must drop before the guard checks the
/// receiver count.
struct GuardedStream {
    inner: BoxStream<'static, Bytes>,
    _guard: TopicGuard,
}

impl Stream for GuardedStream {
    type Item = Bytes;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Bytes>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the topic entry if its last subscriber is gone
    fn collect(&self, topic: &str) {
        self.topics
            .remove_if(topic, |_, tx| tx.receiver_count() == 0);
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let rx = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .subscribe();
        let topic = topic.to_string();
        let guard = TopicGuard {
            topic: topic.clone(),
            topics: Arc::downgrade(&self.topics),
        };
        let stream = BroadcastStream::new(rx).filter_map(move |item| match item {
            Ok(payload) => Some(payload),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                tracing::warn!(topic = %topic, dropped = n, "slow subscriber lagged");
                None
            }
        });
        Ok(Subscription::new(Box::pin(GuardedStream {
            inner: Box::pin(stream),
            _guard: guard,
        })))
    }

    async fn publish(&self, topic: &str, payload: Bytes) -> Result<()> {
        let delivered = match self.topics.get(topic) {
            // send only errors when there are no receivers; fire-and-forget
            Some(tx) => tx.send(payload).unwrap_or(0),
            None => 0,
        };
        if delivered == 0 {
            self.collect(topic);
        }
        Ok(())
    }

    async fn subscriber_count(&self, topic: &str) -> Result<usize> {
        let count = self
            .topics
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0);
        if count == 0 {
            self.collect(topic);
        }
        Ok(count)
    }
}
