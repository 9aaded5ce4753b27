//! Subscription handles
//!
//! A `Subscription` is the consumer's side of one registration: the receive
//! end of its conduit plus the means to release it. Releasing happens
//! exactly once, either through `unsubscribe` or on drop.

use std::fmt::Debug;
use std::hash::Hash;

use tokio::sync::mpsc;

use crate::broadcast::{BroadcastError, Broadcaster, SubscriberId};

use super::store::KeyedRegistry;

/// Handle to one subscription on a keyed registry topic
pub struct Subscription<K: Eq + Hash + Debug, V> {
    key: K,
    id: SubscriberId,
    rx: mpsc::Receiver<V>,
    broadcaster: Broadcaster<V>,
    registry: KeyedRegistry<K, V>,
    released: bool,
}

impl<K: Eq + Hash + Debug, V> Subscription<K, V> {
    /// Build a handle that already holds a claim on the topic but is not
    /// registered yet
    ///
    /// Dropping it before `register` succeeds releases the claim, so a
    /// failed or cancelled subscribe never leaks a subscriber count.
    pub(super) fn pending(
        registry: KeyedRegistry<K, V>,
        key: K,
        broadcaster: Broadcaster<V>,
        rx: mpsc::Receiver<V>,
    ) -> Self {
        Self {
            key,
            // Never handed out by a broadcaster
            id: 0,
            rx,
            broadcaster,
            registry,
            released: false,
        }
    }

    pub(super) async fn register(&mut self, output: mpsc::Sender<V>) -> Result<(), BroadcastError> {
        self.id = self.broadcaster.register(output).await?;
        Ok(())
    }

    pub(super) fn registry(&self) -> &KeyedRegistry<K, V> {
        &self.registry
    }

    /// Topic key this handle is subscribed to
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Subscriber ID within the topic's broadcaster
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Check if the handle has not been unsubscribed yet
    pub fn is_active(&self) -> bool {
        !self.released
    }

    /// Receive the next value
    ///
    /// Returns `None` once the conduit is closed: after `unsubscribe`, when
    /// the topic is closed, or when the subscriber was evicted.
    pub async fn recv(&mut self) -> Option<V> {
        self.rx.recv().await
    }

    /// Receive a value if one is buffered
    pub fn try_recv(&mut self) -> Option<V> {
        self.rx.try_recv().ok()
    }

    /// Stop receiving values
    ///
    /// Waits for the topic's loop to drop this output, releases the handle's
    /// claim on the topic, then drains whatever was still buffered. Calling
    /// it again does nothing.
    pub async fn unsubscribe(&mut self) {
        if self.released {
            return;
        }

        // `released` stays false until the claim is given back, so a caller
        // dropping this future leaves the release to `Drop`.
        //
        // Keep draining while waiting: under `DeliveryPolicy::Block` the
        // loop may be parked on this very output.
        let unregister = self.broadcaster.unregister(self.id);
        tokio::pin!(unregister);
        loop {
            tokio::select! {
                biased;

                _ = &mut unregister => break,
                value = self.rx.recv() => {
                    if value.is_none() {
                        let _ = (&mut unregister).await;
                        break;
                    }
                }
            }
        }

        self.registry.release(&self.key, &self.broadcaster);
        self.released = true;

        self.rx.close();
        while self.rx.recv().await.is_some() {}

        tracing::trace!(topic = ?self.key, subscriber = self.id, "Unsubscribed");
    }
}

impl<K: Eq + Hash + Debug, V> Drop for Subscription<K, V> {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.broadcaster.unregister_now(self.id);
            self.registry.release(&self.key, &self.broadcaster);
        }
    }
}

impl<K: Eq + Hash + Debug, V> Debug for Subscription<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}
