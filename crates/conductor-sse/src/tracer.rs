//! Non-blocking publish-subscribe hub fanning `SSEEvent`s to per-execution
//! and wildcard subscribers.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::event::SSEEvent;

/// Topic used by subscribers that want every event regardless of execution id.
pub const WILDCARD_TOPIC: &str = "*";

const CHANNEL_CAPACITY: usize = 64;

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<SSEEvent>,
}

struct Inner {
    subscribers: RwLock<HashMap<String, Vec<Subscriber>>>,
    active: AtomicU64,
    dropped: AtomicU64,
    next_id: AtomicU64,
}

/// Clone-able handle to the SSE hub. Cheap to clone (an `Arc` underneath) —
/// inject it wherever a step or handler needs to publish or subscribe.
#[derive(Clone)]
pub struct SSETracer {
    inner: Arc<Inner>,
}

impl Default for SSETracer {
    fn default() -> Self {
        Self::new()
    }
}

impl SSETracer {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(HashMap::new()),
                active: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Number of live subscriber channels across all topics.
    pub fn active_subscribers(&self) -> u64 {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Total number of events dropped so far because a subscriber's channel
    /// was full. Exposed so operators can wire it up as a metric.
    pub fn dropped_count(&self) -> u64 {
        self.inner.dropped.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self, topic: impl Into<String>) -> Subscription {
        let topic = topic.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.inner
            .subscribers
            .write()
            .entry(topic.clone())
            .or_default()
            .push(Subscriber { id, tx });
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        Subscription {
            topic,
            id,
            rx,
            tracer: self.clone(),
        }
    }

    /// Deliver `event` to every subscriber of `topic`, and — unless `topic`
    /// is itself the wildcard — every subscriber of `"*"`. Non-blocking: a
    /// full channel drops the event for that subscriber and logs a warning.
    pub fn publish(&self, topic: &str, event: SSEEvent) {
        let subscribers = self.inner.subscribers.read();
        if let Some(list) = subscribers.get(topic) {
            self.fanout(list, &event);
        }
        if topic != WILDCARD_TOPIC {
            if let Some(list) = subscribers.get(WILDCARD_TOPIC) {
                self.fanout(list, &event);
            }
        }
    }

    fn fanout(&self, subscribers: &[Subscriber], event: &SSEEvent) {
        for sub in subscribers {
            match sub.tx.try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    self.inner.dropped.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(subscriber_id = sub.id, "SSE subscriber channel full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = sub.id, "SSE subscriber channel closed");
                }
            }
        }
    }

    fn unsubscribe(&self, topic: &str, id: u64) {
        let mut subscribers = self.inner.subscribers.write();
        if let Some(list) = subscribers.get_mut(topic) {
            list.retain(|s| s.id != id);
            if list.is_empty() {
                subscribers.remove(topic);
            }
        }
        self.inner.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A live subscription. Implements `Stream<Item = SSEEvent>`; dropping it
/// (e.g. when an HTTP client disconnects) unsubscribes and closes the
/// channel automatically.
pub struct Subscription {
    topic: String,
    id: u64,
    rx: mpsc::Receiver<SSEEvent>,
    tracer: SSETracer,
}

impl Stream for Subscription {
    type Item = SSEEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.tracer.unsubscribe(&self.topic, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_core::Stream;
    use std::future::poll_fn;

    async fn next_event(sub: &mut Subscription) -> Option<SSEEvent> {
        tokio::time::timeout(std::time::Duration::from_millis(100), async {
            poll_fn(|cx| Pin::new(&mut *sub).poll_next(cx)).await
        })
        .await
        .ok()
        .flatten()
    }

    #[tokio::test]
    async fn isolation_events_go_only_to_their_topic_and_wildcard() {
        let tracer = SSETracer::new();
        let mut sub_a = tracer.subscribe("exec-1");
        let mut sub_b = tracer.subscribe("exec-2");
        let mut sub_star = tracer.subscribe(WILDCARD_TOPIC);

        tracer.publish("exec-1", SSEEvent::new("exec-1", "step.started", "{}"));

        assert!(next_event(&mut sub_a).await.is_some());
        assert!(next_event(&mut sub_star).await.is_some());
        assert!(next_event(&mut sub_b).await.is_none());
    }

    #[tokio::test]
    async fn fanout_preserves_per_topic_order() {
        let tracer = SSETracer::new();
        let mut sub_star = tracer.subscribe(WILDCARD_TOPIC);
        let mut sub_exec1 = tracer.subscribe("exec-1");

        for i in 0..3 {
            tracer.publish("exec-1", SSEEvent::new("exec-1", format!("evt{i}"), "{}"));
        }
        tracer.publish("exec-2", SSEEvent::new("exec-2", "evt-other", "{}"));

        for i in 0..3 {
            let event = next_event(&mut sub_exec1).await.unwrap();
            assert_eq!(event.event, format!("evt{i}"));
        }
        for i in 0..3 {
            let event = next_event(&mut sub_star).await.unwrap();
            assert_eq!(event.event, format!("evt{i}"));
        }
        let last = next_event(&mut sub_star).await.unwrap();
        assert_eq!(last.event, "evt-other");
    }

    #[tokio::test]
    async fn publish_with_full_channel_drops_without_blocking() {
        let tracer = SSETracer::new();
        let sub = tracer.subscribe("exec-1");
        for i in 0..200u32 {
            tracer.publish("exec-1", SSEEvent::new("exec-1", format!("evt{i}"), "{}"));
        }
        assert!(tracer.dropped_count() > 0);
        drop(sub);
    }

    #[tokio::test]
    async fn dropping_subscription_decrements_active_and_closes_channel() {
        let tracer = SSETracer::new();
        let sub = tracer.subscribe("exec-1");
        assert_eq!(tracer.active_subscribers(), 1);
        drop(sub);
        // Give the synchronous Drop a moment; in practice it's immediate.
        assert_eq!(tracer.active_subscribers(), 0);
    }
}
