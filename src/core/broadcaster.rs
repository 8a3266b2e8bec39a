//! # Discovery feed fan-out.
//!
//! [`DiscoveryBroadcaster`] keeps the latest [`DiscoverySnapshot`] and a registry of
//! consumers. Every consumer gets its own unbounded queue.
//!
//! ```text
//! RadioContext ──publish(snapshot)──► [Registry: current + consumers] ──► DiscoveryStream (each)
//!                                            │
//!                                            └─► watch<usize> (consumer count) ──► ScanController
//! ```
//!
//! ## Rules
//! - A new consumer first receives the current snapshot (possibly empty), then every later one.
//! - Every registered consumer sees every published snapshot, in publish order.
//! - Registration, removal and publication are serialized by one lock; the consumer
//!   count is updated inside that lock, so observers of the count never see a value
//!   that disagrees with the registry.
//! - Removing an unknown id is a no-op. Dropping a [`DiscoveryStream`] removes it.

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::driver::DiscoverySnapshot;
use crate::events::{Bus, Event, EventKind};

/// Identifier of a discovery feed consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID, for correlating feed events with external records.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Default)]
struct Registry {
    current: DiscoverySnapshot,
    consumers: HashMap<SubscriberId, mpsc::UnboundedSender<DiscoverySnapshot>>,
}

struct Shared {
    registry: Mutex<Registry>,
    count: watch::Sender<usize>,
    bus: Bus,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unsubscribe(&self, id: SubscriberId) {
        let mut reg = self.lock();
        if reg.consumers.remove(&id).is_none() {
            return;
        }
        let n = reg.consumers.len();
        self.count.send_replace(n);
        self.bus.publish(
            Event::new(EventKind::DiscoveryUnsubscribed)
                .with_subscriber(id)
                .with_count(n),
        );
    }
}

/// Single-producer, multi-consumer discovery feed.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct DiscoveryBroadcaster {
    shared: Arc<Shared>,
}

impl DiscoveryBroadcaster {
    /// Creates an empty broadcaster (empty current snapshot, no consumers).
    pub fn new(bus: Bus) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry::default()),
                count,
                bus,
            }),
        }
    }

    /// Registers a consumer.
    ///
    /// The returned stream yields the current snapshot immediately, then every
    /// snapshot published afterwards. Dropping the stream unsubscribes.
    pub fn subscribe(&self) -> DiscoveryStream {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::unbounded_channel();

        {
            let mut reg = self.shared.lock();
            // receiver is alive, send cannot fail
            let _ = tx.send(reg.current.clone());
            reg.consumers.insert(id, tx);
            let n = reg.consumers.len();
            self.shared.count.send_replace(n);
            self.shared.bus.publish(
                Event::new(EventKind::DiscoverySubscribed)
                    .with_subscriber(id)
                    .with_count(n),
            );
        }

        DiscoveryStream {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Removes a consumer; its stream ends after draining queued snapshots.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.shared.unsubscribe(id);
    }

    /// Replaces the current snapshot and delivers it to every consumer.
    pub fn publish(&self, snapshot: DiscoverySnapshot) {
        let mut reg = self.shared.lock();
        reg.current = snapshot.clone();

        let before = reg.consumers.len();
        reg.consumers.retain(|_, tx| tx.send(snapshot.clone()).is_ok());
        let after = reg.consumers.len();
        if after != before {
            self.shared.count.send_replace(after);
        }

        self.shared.bus.publish(
            Event::new(EventKind::SnapshotPublished).with_count(snapshot.len()),
        );
    }

    /// Returns the latest published snapshot.
    pub fn current(&self) -> DiscoverySnapshot {
        self.shared.lock().current.clone()
    }

    /// Returns the number of registered consumers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().consumers.len()
    }

    /// Observable consumer count.
    pub fn watch_count(&self) -> watch::Receiver<usize> {
        self.shared.count.subscribe()
    }
}

/// Stream of discovery snapshots for one consumer.
///
/// Dropping the stream unsubscribes the consumer.
pub struct DiscoveryStream {
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<DiscoverySnapshot>,
    shared: Weak<Shared>,
}

impl DiscoveryStream {
    /// Identifier to pass to [`DiscoveryBroadcaster::unsubscribe`].
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Receives the next snapshot, or `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<DiscoverySnapshot> {
        self.rx.recv().await
    }
}

impl Stream for DiscoveryStream {
    type Item = DiscoverySnapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for DiscoveryStream {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for DiscoveryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryStream").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{PeripheralId, PeripheralRef};
    use futures::StreamExt;

    fn snapshot(n: usize) -> DiscoverySnapshot {
        (0..n)
            .map(|_| PeripheralRef::new(PeripheralId::new_v4()))
            .collect::<Vec<_>>()
            .into()
    }

    #[tokio::test]
    async fn new_consumer_gets_current_snapshot_first() {
        let b = DiscoveryBroadcaster::new(Bus::new(16));
        let mut empty = b.subscribe();
        assert_eq!(empty.recv().await.map(|s| s.len()), Some(0));

        b.publish(snapshot(2));
        let mut late = b.subscribe();
        assert_eq!(late.recv().await.map(|s| s.len()), Some(2));
    }

    #[tokio::test]
    async fn every_consumer_sees_every_snapshot_in_order() {
        let b = DiscoveryBroadcaster::new(Bus::new(16));
        let mut s1 = b.subscribe();
        let mut s2 = b.subscribe();

        for n in 1..=3 {
            b.publish(snapshot(n));
        }

        for s in [&mut s1, &mut s2] {
            let lens: Vec<_> = s.by_ref().take(4).map(|snap| snap.len()).collect().await;
            assert_eq!(lens, vec![0, 1, 2, 3]);
        }
    }

    #[tokio::test]
    async fn count_tracks_registry() {
        let b = DiscoveryBroadcaster::new(Bus::new(16));
        let count = b.watch_count();
        assert_eq!(*count.borrow(), 0);

        let s1 = b.subscribe();
        let s2 = b.subscribe();
        assert_eq!(*count.borrow(), 2);

        b.unsubscribe(s1.id());
        assert_eq!(*count.borrow(), 1);

        drop(s2);
        assert_eq!(*count.borrow(), 0);
        assert_eq!(b.subscriber_count(), 0);

        // dropping s1 after explicit unsubscribe is a no-op
        drop(s1);
        assert_eq!(*count.borrow(), 0);
    }

    #[tokio::test]
    async fn unsubscribed_stream_ends_after_draining() {
        let b = DiscoveryBroadcaster::new(Bus::new(16));
        let mut s = b.subscribe();
        b.publish(snapshot(1));
        b.unsubscribe(s.id());
        b.publish(snapshot(5));

        assert_eq!(s.next().await.map(|x| x.len()), Some(0));
        assert_eq!(s.next().await.map(|x| x.len()), Some(1));
        assert!(s.next().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_churn_keeps_registry_consistent() {
        const LAST: usize = 40;
        let b = DiscoveryBroadcaster::new(Bus::new(16));

        let consumers: Vec<_> = (0..16)
            .map(|i| {
                let b = b.clone();
                tokio::spawn(async move {
                    let mut s = b.subscribe();
                    let mut seen = Vec::new();
                    while let Some(snap) = s.recv().await {
                        seen.push(snap.len());
                        // every fourth consumer stays until the last snapshot
                        if snap.len() == LAST || (i % 4 != 0 && seen.len() == 3) {
                            break;
                        }
                    }
                    match i % 4 {
                        1 => b.unsubscribe(s.id()),
                        _ => drop(s),
                    }
                    seen
                })
            })
            .collect();

        let publisher = {
            let b = b.clone();
            tokio::spawn(async move {
                for n in 1..=LAST {
                    b.publish(snapshot(n));
                    tokio::task::yield_now().await;
                }
            })
        };

        publisher.await.unwrap();
        for (i, consumer) in consumers.into_iter().enumerate() {
            let seen = consumer.await.unwrap();
            assert!(!seen.is_empty(), "consumer {i} saw nothing");
            // no snapshot dropped, duplicated or reordered
            assert!(
                seen.windows(2).all(|w| w[1] == w[0] + 1),
                "consumer {i}: {seen:?}"
            );
            if i % 4 == 0 {
                assert_eq!(seen.last(), Some(&LAST));
            }
        }

        assert_eq!(b.subscriber_count(), 0);
        assert_eq!(*b.watch_count().borrow(), 0);
    }

    #[tokio::test]
    async fn unknown_id_is_noop() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let b = DiscoveryBroadcaster::new(bus);
        let other = DiscoveryBroadcaster::new(Bus::new(1));
        let foreign = other.subscribe();

        b.unsubscribe(foreign.id());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registration_is_published_on_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let b = DiscoveryBroadcaster::new(bus);

        let s = b.subscribe();
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::DiscoverySubscribed);
        assert_eq!(ev.subscriber, Some(s.id()));
        assert_eq!(ev.count, Some(1));

        let t = b.subscribe();
        assert_ne!(s.id().as_uuid(), t.id().as_uuid());
        assert_eq!(s.id().to_string(), s.id().as_uuid().to_string());
    }
}
