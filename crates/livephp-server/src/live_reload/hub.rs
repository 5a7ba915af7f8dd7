//! Reload notification fan-out.
//!
//! Every subscriber owns a single-slot mailbox. Broadcasting offers one
//! signal to each mailbox without blocking; a mailbox that still holds an
//! undelivered signal is skipped, so a slow client never queues more than
//! one reload and never stalls the broadcaster.
//!
//! Closing the hub ends every subscription so long-lived event streams let
//! the server drain on shutdown.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Identity of one subscription, used only for set membership.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct SubscriberId(Uuid);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

type Subscribers = HashMap<SubscriberId, mpsc::Sender<()>>;

/// Set of live-reload subscribers.
///
/// Cloning is cheap; clones share the same subscriber set.
#[derive(Clone, Debug)]
pub(crate) struct NotificationHub {
    subscribers: Arc<Mutex<Subscribers>>,
    closed: Arc<watch::Sender<bool>>,
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationHub {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: Arc::default(),
            closed: Arc::new(watch::Sender::new(false)),
        }
    }

    /// Register a new subscriber.
    ///
    /// The returned handle unsubscribes itself when dropped.
    pub(crate) fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(1);
        let id = SubscriberId(Uuid::new_v4());

        let count = {
            let mut subscribers = self.subscribers.lock().unwrap();
            subscribers.insert(id, tx);
            subscribers.len()
        };
        tracing::debug!(subscriber = %id, subscribers = count, "Live reload client connected");

        Subscription {
            id,
            rx,
            closed: self.closed.subscribe(),
            hub: self.clone(),
        }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub(crate) fn unsubscribe(&self, id: &SubscriberId) -> bool {
        let (removed, count) = {
            let mut subscribers = self.subscribers.lock().unwrap();
            let removed = subscribers.remove(id).is_some();
            (removed, subscribers.len())
        };
        if removed {
            tracing::debug!(subscriber = %id, subscribers = count, "Live reload client disconnected");
        }
        removed
    }

    /// Offer one reload signal to every subscriber.
    ///
    /// The lock is held for the whole pass. Returns how many subscribers
    /// accepted a new signal.
    pub(crate) fn broadcast(&self) -> usize {
        let subscribers = self.subscribers.lock().unwrap();
        let mut delivered = 0;

        for (id, tx) in &*subscribers {
            match tx.try_send(()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(())) => {}
                Err(TrySendError::Closed(())) => {
                    tracing::warn!(subscriber = %id, "Subscriber channel closed before unsubscribe");
                }
            }
        }

        delivered
    }

    /// Number of registered subscribers.
    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    /// End all current and future subscriptions.
    ///
    /// Subscribers stay registered until their handles are dropped.
    pub(crate) fn close(&self) {
        self.closed.send_replace(true);
    }
}

/// One open event-stream connection.
#[derive(Debug)]
pub(crate) struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<()>,
    closed: watch::Receiver<bool>,
    hub: NotificationHub,
}

impl Subscription {
    /// Wait for the next reload signal.
    ///
    /// Returns `None` once the subscription has been removed from the hub
    /// or the hub has been closed.
    pub(crate) async fn recv(&mut self) -> Option<()> {
        tokio::select! {
            signal = self.rx.recv() => signal,
            _ = self.closed.wait_for(|closed| *closed) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Remove the sender first so no broadcast can observe a closed channel.
        self.hub.unsubscribe(&self.id);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_broadcast_reaches_every_subscriber() {
        let hub = NotificationHub::new();
        let mut subs: Vec<_> = (0..5).map(|_| hub.subscribe()).collect();

        assert_eq!(hub.broadcast(), 5);

        for sub in &mut subs {
            assert_eq!(sub.recv().await, Some(()));
            assert!(sub.rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_then_broadcast() {
        let hub = NotificationHub::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let hub = hub.clone();
                tokio::spawn(async move { hub.subscribe() })
            })
            .collect();
        let mut subs = Vec::new();
        for handle in handles {
            subs.push(handle.await.unwrap());
        }

        assert_eq!(hub.subscriber_count(), 16);
        assert_eq!(hub.broadcast(), 16);
        for sub in &mut subs {
            assert_eq!(sub.rx.try_recv(), Ok(()));
        }
    }

    #[tokio::test]
    async fn test_undrained_subscriber_holds_one_signal() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe();

        assert_eq!(hub.broadcast(), 1);
        assert_eq!(hub.broadcast(), 0);
        assert_eq!(hub.broadcast(), 0);

        assert_eq!(sub.rx.try_recv(), Ok(()));
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_full_subscriber_does_not_block_others() {
        let hub = NotificationHub::new();
        let _slow = hub.subscribe();
        let mut fast = hub.subscribe();

        hub.broadcast();
        assert_eq!(fast.recv().await, Some(()));

        assert_eq!(hub.broadcast(), 1);
        assert_eq!(fast.recv().await, Some(()));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let hub = NotificationHub::new();
        let sub = hub.subscribe();
        let id = sub.id;
        assert_eq!(hub.subscriber_count(), 1);

        drop(sub);

        assert_eq!(hub.subscriber_count(), 0);
        assert!(!hub.unsubscribe(&id));
        assert_eq!(hub.broadcast(), 0);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe();

        assert!(hub.unsubscribe(&sub.id));
        assert_eq!(hub.broadcast(), 0);
        assert!(sub.rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_ends_subscriptions() {
        let hub = NotificationHub::new();
        let mut before = hub.subscribe();

        hub.close();
        let mut after = hub.subscribe();

        assert_eq!(before.recv().await, None);
        assert_eq!(after.recv().await, None);
        assert_eq!(hub.subscriber_count(), 2);

        drop(before);
        drop(after);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_recv_ends_after_unsubscribe() {
        let hub = NotificationHub::new();
        let mut sub = hub.subscribe();

        hub.unsubscribe(&sub.id);

        assert_eq!(sub.recv().await, None);
    }
}
