//! In-process event bus for live catalog updates
//!
//! Publishers hand a payload to every subscriber currently registered on a
//! [Topic]. Each subscriber owns a bounded queue (a single-receiver tokio
//! broadcast channel), so a slow consumer never blocks the publisher; when its
//! queue is full the oldest undelivered payload is discarded. Tokio rounds a
//! channel's capacity up to the next power of two and allocates every slot when
//! the channel is created, so a capacity of 3 actually retains 4 payloads.
//!
//! Lifecycle of a subscriber: registered -> delivering -> cancelled. Cancellation
//! happens when the [Subscription] is dropped (the connection closed or the
//! client completed the operation) or when [SubscriptionHandle::unsubscribe] is
//! called from any task. Both paths are idempotent. Once cancelled the registry
//! holds no reference to the subscriber.
//!
//! Delivery is at-most-once. Nothing is buffered for topics without subscribers.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, warn};

/// A named event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    BookAdded,
}

impl Topic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::BookAdded => "BOOK_ADDED",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one registration on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

type Subscribers<T> = HashMap<SubscriberId, broadcast::Sender<T>>;

struct Registry<T> {
    topics: RwLock<HashMap<Topic, Subscribers<T>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl<T> Registry<T> {
    fn remove(&self, topic: Topic, id: SubscriberId) -> bool {
        let mut topics = self.topics.write();
        let Some(subscribers) = topics.get_mut(&topic) else {
            return false;
        };
        let removed = subscribers.remove(&id).is_some();
        if subscribers.is_empty() {
            topics.remove(&topic);
        }
        removed
    }

    fn count(&self, topic: Topic) -> usize {
        self.topics.read().get(&topic).map_or(0, HashMap::len)
    }
}

/// Process-wide publish/subscribe registry, cheap to clone
pub struct EventBus<T> {
    registry: Arc<Registry<T>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> EventBus<T> {
    /// Create a bus whose subscribers each queue at most `queue_capacity`
    /// payloads, rounded up to a power of two.
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                topics: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                queue_capacity: queue_capacity.max(1),
            }),
        }
    }

    /// Register a new subscriber on `topic`.
    ///
    /// The returned stream yields payloads published from this moment on, in
    /// publish order. It never ends by itself; it ends only after the
    /// registration has been removed and its queue drained.
    pub fn subscribe(&self, topic: Topic) -> Subscription<T> {
        let id = SubscriberId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = broadcast::channel(self.registry.queue_capacity);

        let total = {
            let mut topics = self.registry.topics.write();
            let subscribers = topics.entry(topic).or_default();
            subscribers.insert(id, sender);
            subscribers.len()
        };
        debug!(topic = %topic, subscriber = %id, subscribers = total, "Subscriber registered");

        Subscription {
            inner: Box::pin(BroadcastStream::new(receiver)),
            handle: SubscriptionHandle {
                topic,
                id,
                registry: Arc::downgrade(&self.registry),
            },
        }
    }

    /// Hand `payload` to every subscriber of `topic`.
    ///
    /// Never blocks and never fails. Subscribers whose receiving side is gone
    /// are pruned from the registry. Returns how many subscribers accepted the
    /// payload.
    pub fn publish(&self, topic: Topic, payload: T) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        {
            let topics = self.registry.topics.read();
            let Some(subscribers) = topics.get(&topic) else {
                debug!(topic = %topic, "No subscribers, event dropped");
                return 0;
            };
            for (id, sender) in subscribers {
                match sender.send(payload.clone()) {
                    Ok(_) => delivered += 1,
                    Err(_) => closed.push(*id),
                }
            }
        }

        for id in closed {
            if self.registry.remove(topic, id) {
                debug!(topic = %topic, subscriber = %id, "Pruned closed subscriber");
            }
        }

        delivered
    }

}

impl<T> EventBus<T> {
    /// Remove a registration. Safe to call repeatedly and from any task.
    pub fn unsubscribe(&self, topic: Topic, id: SubscriberId) -> bool {
        let removed = self.registry.remove(topic, id);
        if removed {
            debug!(topic = %topic, subscriber = %id, "Subscriber unregistered");
        }
        removed
    }

    /// Number of live registrations on `topic`
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry.count(topic)
    }
}

/// Detached reference to a registration, usable from any task
pub struct SubscriptionHandle<T> {
    topic: Topic,
    id: SubscriberId,
    registry: Weak<Registry<T>>,
}

impl<T> Clone for SubscriptionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic,
            id: self.id,
            registry: self.registry.clone(),
        }
    }
}

impl<T> SubscriptionHandle<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Cancel the registration; returns false if it was already gone
    pub fn unsubscribe(&self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => EventBus { registry }.unsubscribe(self.topic, self.id),
            None => false,
        }
    }
}

/// A subscriber's lazy sequence of payloads. Dropping it unregisters.
pub struct Subscription<T> {
    inner: Pin<Box<BroadcastStream<T>>>,
    handle: SubscriptionHandle<T>,
}

impl<T> Subscription<T> {
    pub fn handle(&self) -> SubscriptionHandle<T> {
        self.handle.clone()
    }

    pub fn unsubscribe(&self) -> bool {
        self.handle.unsubscribe()
    }
}

impl<T: Clone + Send + 'static> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        loop {
            let polled = self.inner.as_mut().poll_next(cx);
            match polled {
                Poll::Ready(Some(Ok(payload))) => return Poll::Ready(Some(payload)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    warn!(
                        topic = %self.handle.topic(),
                        subscriber = %self.handle.id(),
                        skipped,
                        "Subscriber queue full, oldest events dropped"
                    );
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::{FutureExt, StreamExt};
    use pretty_assertions::assert_eq;

    use super::*;

    async fn next_within<T: Clone + Send + 'static>(sub: &mut Subscription<T>) -> Option<T> {
        tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .expect("timed out waiting for event")
    }

    #[tokio::test]
    async fn test_delivers_in_publish_order() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe(Topic::BookAdded);

        for n in 1..=3 {
            assert_eq!(bus.publish(Topic::BookAdded, n), 1);
        }

        assert_eq!(next_within(&mut sub).await, Some(1));
        assert_eq!(next_within(&mut sub).await, Some(2));
        assert_eq!(next_within(&mut sub).await, Some(3));
        assert!(sub.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_dropped() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(Topic::BookAdded, "lost"), 0);

        let mut sub = bus.subscribe(Topic::BookAdded);
        assert!(sub.next().now_or_never().is_none());

        bus.publish(Topic::BookAdded, "seen");
        assert_eq!(next_within(&mut sub).await, Some("seen"));
    }

    #[tokio::test]
    async fn test_each_subscriber_gets_every_event() {
        let bus = EventBus::new(16);
        let mut first = bus.subscribe(Topic::BookAdded);
        let mut second = bus.subscribe(Topic::BookAdded);

        assert_eq!(bus.publish(Topic::BookAdded, 'a'), 2);
        assert_eq!(bus.publish(Topic::BookAdded, 'b'), 2);

        for sub in [&mut first, &mut second] {
            assert_eq!(next_within(sub).await, Some('a'));
            assert_eq!(next_within(sub).await, Some('b'));
        }
    }

    #[tokio::test]
    async fn test_drop_unregisters() {
        let bus = EventBus::new(16);
        let keep = bus.subscribe(Topic::BookAdded);
        let gone = bus.subscribe(Topic::BookAdded);
        assert_eq!(bus.subscriber_count(Topic::BookAdded), 2);

        drop(gone);
        assert_eq!(bus.subscriber_count(Topic::BookAdded), 1);
        assert_eq!(bus.publish(Topic::BookAdded, 7), 1);

        drop(keep);
        assert_eq!(bus.subscriber_count(Topic::BookAdded), 0);
        assert_eq!(bus.publish(Topic::BookAdded, 8), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent_across_tasks() {
        let bus = EventBus::new(16);
        let mut sub = bus.subscribe(Topic::BookAdded);
        let handle = sub.handle();

        let removed = tokio::spawn(async move { (handle.unsubscribe(), handle.unsubscribe()) })
            .await
            .unwrap();
        assert_eq!(removed, (true, false));
        assert!(!bus.unsubscribe(Topic::BookAdded, sub.handle().id()));
        assert!(!sub.unsubscribe());

        assert_eq!(bus.publish(Topic::BookAdded, 1), 0);
        assert_eq!(next_within(&mut sub).await, None);
    }

    #[tokio::test]
    async fn test_full_queue_drops_oldest() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe(Topic::BookAdded);

        for n in 1..=5 {
            assert_eq!(bus.publish(Topic::BookAdded, n), 1);
        }

        assert_eq!(next_within(&mut sub).await, Some(4));
        assert_eq!(next_within(&mut sub).await, Some(5));
        assert!(sub.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_queue_capacity_rounds_up_to_power_of_two() {
        let bus = EventBus::new(3);
        let mut sub = bus.subscribe(Topic::BookAdded);

        for n in 1..=6 {
            bus.publish(Topic::BookAdded, n);
        }

        for expected in 3..=6 {
            assert_eq!(next_within(&mut sub).await, Some(expected));
        }
        assert!(sub.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_handle_outliving_bus_is_harmless() {
        let bus = EventBus::<u8>::new(4);
        let sub = bus.subscribe(Topic::BookAdded);
        let handle = sub.handle();
        drop(bus);

        drop(sub);
        assert!(!handle.unsubscribe());
    }

    #[tokio::test]
    async fn test_removal_during_delivery_keeps_others_intact() {
        const EVENTS: u32 = 100;
        let bus = EventBus::new(EVENTS as usize);

        let survivors: Vec<_> = (0..4).map(|_| bus.subscribe(Topic::BookAdded)).collect();
        let leavers: Vec<_> = (0..4).map(|_| bus.subscribe(Topic::BookAdded)).collect();

        let publisher = {
            let bus = bus.clone();
            tokio::spawn(async move {
                for n in 0..EVENTS {
                    bus.publish(Topic::BookAdded, n);
                    tokio::task::yield_now().await;
                }
            })
        };
        let leaver_task = tokio::spawn(async move {
            for sub in leavers {
                tokio::task::yield_now().await;
                drop(sub);
            }
        });

        publisher.await.unwrap();
        leaver_task.await.unwrap();
        assert_eq!(bus.subscriber_count(Topic::BookAdded), 4);

        for mut sub in survivors {
            let mut received = Vec::new();
            for _ in 0..EVENTS {
                received.push(next_within(&mut sub).await.unwrap());
            }
            assert_eq!(received, (0..EVENTS).collect::<Vec<_>>());
        }
    }
}
