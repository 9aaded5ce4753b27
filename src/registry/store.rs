//! Keyed registry implementation
//!
//! The central registry that owns one broadcaster per topic key and hands
//! out subscription handles.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use tokio::sync::mpsc;

use crate::broadcast::Broadcaster;

use super::config::{RegistryConfig, TeardownPolicy};
use super::entry::{TopicEntry, TopicStats};
use super::error::RegistryError;
use super::subscription::Subscription;

/// Multi-topic pub/sub registry
///
/// Cloning is cheap and every clone shares the same topics, so one
/// registry is built at startup and handed to whichever service needs it.
///
/// The topic map lock only covers lookups, inserts and removals; publishing
/// and delivery happen on the topic's broadcaster after it is released.
pub struct KeyedRegistry<K, V> {
    inner: Arc<Inner<K, V>>,
}

struct Inner<K, V> {
    /// Map of topic key to topic entry
    topics: RwLock<HashMap<K, TopicEntry<V>>>,

    /// Configuration
    config: RegistryConfig,
}

impl<K, V> Clone for KeyedRegistry<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> KeyedRegistry<K, V> {
    /// Create a new registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                topics: RwLock::new(HashMap::new()),
                config,
            }),
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.inner.config
    }

    /// Get total number of topics
    pub fn topic_count(&self) -> usize {
        self.read_topics().len()
    }

    // Nothing panics while holding the lock, but recover anyway rather
    // than take the whole registry down with one poisoned guard.
    fn read_topics(&self) -> RwLockReadGuard<'_, HashMap<K, TopicEntry<V>>> {
        self.inner
            .topics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_topics(&self) -> RwLockWriteGuard<'_, HashMap<K, TopicEntry<V>>> {
        self.inner
            .topics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> KeyedRegistry<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    /// Create a new registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Subscribe to a topic
    ///
    /// The topic is created if it doesn't exist. Values published after
    /// this returns are delivered to the handle; earlier ones are not.
    pub async fn subscribe(&self, key: K) -> Result<Subscription<K, V>, RegistryError> {
        let broadcaster = {
            let mut topics = self.write_topics();

            let entry = topics.entry(key.clone()).or_insert_with(|| {
                tracing::info!(topic = ?key, "Topic created");
                TopicEntry::new(&self.inner.config)
            });

            entry.subscribers += 1;
            entry.idle_since = None;
            entry.broadcaster.clone()
        };

        let (output, rx) = mpsc::channel(broadcaster.output_capacity());
        let mut subscription = Subscription::pending(self.clone(), key, broadcaster, rx);

        // On error the handle is dropped, which gives the claim back
        if subscription.register(output).await.is_err() {
            return Err(RegistryError::TopicClosed(format!(
                "{:?}",
                subscription.key()
            )));
        }

        tracing::debug!(
            topic = ?subscription.key(),
            subscriber = subscription.id(),
            subscribers = self.subscriber_count(subscription.key()),
            "Subscriber added"
        );

        Ok(subscription)
    }

    /// Unsubscribe a handle
    ///
    /// Same as `Subscription::unsubscribe`; calling it again is a no-op.
    /// Handles issued by another registry are left untouched.
    pub async fn unsubscribe(&self, subscription: &mut Subscription<K, V>) {
        if !Arc::ptr_eq(&self.inner, &subscription.registry().inner) {
            tracing::warn!(
                topic = ?subscription.key(),
                "Subscription belongs to another registry, ignored"
            );
            return;
        }

        subscription.unsubscribe().await;
    }

    /// Publish a value to every current subscriber of a topic
    ///
    /// Waits while the topic's input buffer is full. Values for topics
    /// with no subscribers are dropped, including a topic torn down while
    /// the value was on its way.
    pub async fn publish(&self, key: &K, value: V) -> Result<(), RegistryError> {
        let Some(broadcaster) = self.broadcaster(key) else {
            tracing::trace!(topic = ?key, "No topic, value dropped");
            return Ok(());
        };

        if broadcaster.submit(value).await.is_err() {
            tracing::trace!(topic = ?key, "Topic closing, value dropped");
        }

        Ok(())
    }

    /// Publish a value without waiting
    ///
    /// Returns `false` if there is no topic, its input buffer is full, or
    /// it is closing.
    pub fn try_publish(&self, key: &K, value: V) -> bool {
        self.broadcaster(key)
            .is_some_and(|broadcaster| broadcaster.try_submit(value))
    }

    /// Remove and close a topic
    ///
    /// Active subscribers see their conduit close. A later `subscribe`
    /// creates a fresh topic.
    pub fn close_topic(&self, key: &K) -> bool {
        let removed = self.write_topics().remove(key);

        match removed {
            Some(entry) => {
                entry.broadcaster.close();
                tracing::info!(
                    topic = ?key,
                    subscribers = entry.subscribers,
                    "Topic closed"
                );
                true
            }
            None => false,
        }
    }

    /// Close every topic
    pub fn close_all(&self) {
        let drained: Vec<(K, TopicEntry<V>)> = self.write_topics().drain().collect();

        for (key, entry) in drained {
            entry.broadcaster.close();
            tracing::debug!(topic = ?key, "Topic closed");
        }
    }

    /// Check if a topic exists
    pub fn has_topic(&self, key: &K) -> bool {
        self.read_topics().contains_key(key)
    }

    /// Get the number of live subscription handles for a topic
    pub fn subscriber_count(&self, key: &K) -> usize {
        self.read_topics()
            .get(key)
            .map_or(0, |entry| entry.subscribers)
    }

    /// Get topic statistics
    pub fn topic_stats(&self, key: &K) -> Option<TopicStats> {
        self.read_topics().get(key).map(TopicEntry::stats)
    }

    /// Run cleanup once
    ///
    /// Removes topics whose broadcaster has exited, and under
    /// `TeardownPolicy::Retain`, topics that have had no subscribers for
    /// longer than `idle_topic_timeout`.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let timeout = self.inner.config.idle_topic_timeout;

        let mut topics = self.write_topics();
        let keys_to_remove: Vec<K> = topics
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, timeout))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys_to_remove {
            if let Some(entry) = topics.remove(key) {
                entry.broadcaster.close();
                tracing::info!(topic = ?key, "Topic removed by cleanup");
            }
        }

        keys_to_remove.len()
    }

    /// Spawn background cleanup task
    ///
    /// Returns a handle that can be used to abort the task.
    pub fn spawn_cleanup_task(&self) -> tokio::task::JoinHandle<()> {
        let registry = self.clone();
        let interval = registry.inner.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                registry.cleanup();
            }
        })
    }

    fn broadcaster(&self, key: &K) -> Option<Broadcaster<V>> {
        self.read_topics()
            .get(key)
            .map(|entry| entry.broadcaster.clone())
    }
}

impl<K: Eq + Hash + Debug, V> KeyedRegistry<K, V> {
    /// Drop one subscription handle's claim on a topic
    ///
    /// Ignored if the topic was closed (and maybe recreated) in the meantime.
    pub(super) fn release(&self, key: &K, broadcaster: &Broadcaster<V>) {
        let mut topics = self.write_topics();

        let Some(entry) = topics.get_mut(key) else {
            return;
        };
        if !entry.broadcaster.same_loop(broadcaster) {
            return;
        }

        entry.subscribers = entry.subscribers.saturating_sub(1);
        tracing::debug!(
            topic = ?key,
            subscribers = entry.subscribers,
            "Subscriber removed"
        );

        if entry.subscribers > 0 {
            return;
        }

        match self.inner.config.teardown {
            TeardownPolicy::Eager => {
                if let Some(entry) = topics.remove(key) {
                    entry.broadcaster.close();
                    tracing::info!(topic = ?key, "Topic removed, no subscribers");
                }
            }
            TeardownPolicy::Retain => {
                entry.idle_since = Some(Instant::now());
            }
        }
    }
}

impl<K, V> Default for KeyedRegistry<K, V>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
