//! Streaming delivery loop
//!
//! Bridges one subscription to one outbound sink for the lifetime of a
//! server-streaming call.

use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;

use crate::registry::{KeyedRegistry, RegistryError, Subscription};

use super::sink::DeliverySink;

/// Why a delivery loop stopped without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The caller's cancellation future completed
    Cancelled,
    /// The topic closed the conduit (topic closed or subscriber evicted)
    TopicClosed,
}

/// Summary of a finished delivery loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Values handed to the sink successfully
    pub forwarded: u64,
    /// Why the loop stopped
    pub stop: StopReason,
}

/// Error type for delivery loops
#[derive(Debug)]
pub enum DeliveryError<E> {
    /// Subscribing to the topic failed
    Subscribe(RegistryError),
    /// The sink rejected a value
    Sink(E),
}

impl<E: std::fmt::Display> std::fmt::Display for DeliveryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryError::Subscribe(e) => write!(f, "Subscribe failed: {}", e),
            DeliveryError::Sink(e) => write!(f, "Sink send failed: {}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for DeliveryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeliveryError::Subscribe(e) => Some(e),
            DeliveryError::Sink(e) => Some(e),
        }
    }
}

/// Relay a topic to a sink until cancelled
///
/// Subscribes to `key`, then forwards every value to `sink` until `cancel`
/// completes (success), the sink fails (error) or the topic closes the
/// conduit (success). The subscription is released exactly once on every
/// exit path, draining whatever was still buffered.
pub async fn deliver<K, V, S, C>(
    registry: &KeyedRegistry<K, V>,
    key: K,
    sink: &mut S,
    cancel: C,
) -> Result<DeliveryReport, DeliveryError<S::Error>>
where
    K: Clone + Eq + Hash + Debug + Send + Sync + 'static,
    V: Clone + Send + 'static,
    S: DeliverySink<V>,
    C: Future<Output = ()>,
{
    let mut subscription = registry
        .subscribe(key)
        .await
        .map_err(DeliveryError::Subscribe)?;

    tracing::debug!(
        topic = ?subscription.key(),
        subscriber = subscription.id(),
        "Delivery started"
    );

    let (forwarded, result) = relay(&mut subscription, sink, cancel).await;

    subscription.unsubscribe().await;

    match result {
        Ok(stop) => {
            tracing::debug!(
                topic = ?subscription.key(),
                forwarded = forwarded,
                reason = ?stop,
                "Delivery finished"
            );
            Ok(DeliveryReport { forwarded, stop })
        }
        Err(e) => {
            tracing::debug!(
                topic = ?subscription.key(),
                forwarded = forwarded,
                "Delivery aborted, sink failed"
            );
            Err(DeliveryError::Sink(e))
        }
    }
}

async fn relay<K, V, S, C>(
    subscription: &mut Subscription<K, V>,
    sink: &mut S,
    cancel: C,
) -> (u64, Result<StopReason, S::Error>)
where
    K: Eq + Hash + Debug,
    S: DeliverySink<V>,
    C: Future<Output = ()>,
{
    tokio::pin!(cancel);
    let mut forwarded = 0;

    loop {
        let value = tokio::select! {
            biased;

            _ = &mut cancel => return (forwarded, Ok(StopReason::Cancelled)),
            value = subscription.recv() => match value {
                Some(value) => value,
                None => return (forwarded, Ok(StopReason::TopicClosed)),
            },
        };

        // A peer that stops reading must not outlive the call
        tokio::select! {
            biased;

            _ = &mut cancel => return (forwarded, Ok(StopReason::Cancelled)),
            sent = sink.send(value) => match sent {
                Ok(()) => forwarded += 1,
                Err(e) => return (forwarded, Err(e)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Duration;

    use tokio::sync::{mpsc, oneshot};
    use tokio_test::{assert_pending, task};

    use super::*;
    use crate::registry::RegistryConfig;

    /// Sink that records values and fails after a fixed number of sends
    struct FlakySink {
        sent: Vec<u32>,
        fail_after: usize,
    }

    impl DeliverySink<u32> for FlakySink {
        type Error = io::Error;

        async fn send(&mut self, value: u32) -> Result<(), Self::Error> {
            if self.sent.len() >= self.fail_after {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            self.sent.push(value);
            Ok(())
        }
    }

    /// Wait until the topic's loop has registered `count` outputs
    async fn wait_for_outputs(
        registry: &KeyedRegistry<&'static str, u32>,
        key: &'static str,
        count: usize,
    ) {
        while !registry
            .topic_stats(&key)
            .is_some_and(|stats| stats.outputs >= count)
        {
            tokio::task::yield_now().await;
        }
    }

    /// Let spawned topic loops run until they park again
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_deliver_until_cancelled() {
        let registry = KeyedRegistry::<&str, u32>::new();
        let (mut sink, mut peer) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                deliver(&registry, "chan-1", &mut sink, async {
                    let _ = cancel_rx.await;
                })
                .await
            })
        };

        wait_for_outputs(&registry, "chan-1", 1).await;
        registry.publish(&"chan-1", 1).await.unwrap();
        registry.publish(&"chan-1", 2).await.unwrap();

        assert_eq!(peer.recv().await, Some(1));
        assert_eq!(peer.recv().await, Some(2));

        cancel_tx.send(()).unwrap();
        let report = task.await.unwrap().unwrap();

        assert_eq!(report.forwarded, 2);
        assert_eq!(report.stop, StopReason::Cancelled);
        assert!(!registry.has_topic(&"chan-1"));
    }

    #[tokio::test]
    async fn test_deliver_sink_failure() {
        let registry = KeyedRegistry::<&str, u32>::new();
        let mut sink = FlakySink {
            sent: Vec::new(),
            fail_after: 2,
        };

        let publisher = {
            let registry = registry.clone();
            tokio::spawn(async move {
                wait_for_outputs(&registry, "chan-1", 1).await;
                for value in 0..5 {
                    let _ = registry.publish(&"chan-1", value).await;
                }
            })
        };

        let result = deliver(&registry, "chan-1", &mut sink, std::future::pending()).await;
        publisher.await.unwrap();

        assert!(matches!(result, Err(DeliveryError::Sink(_))));
        assert_eq!(sink.sent, vec![0, 1]);
        assert_eq!(registry.subscriber_count(&"chan-1"), 0);
        assert!(!registry.has_topic(&"chan-1"));
    }

    #[tokio::test]
    async fn test_sink_failure_isolated_to_one_subscriber() {
        let registry = KeyedRegistry::<&str, u32>::new();
        let mut healthy = registry.subscribe("chan-1").await.unwrap();

        let failing = {
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut sink = FlakySink {
                    sent: Vec::new(),
                    fail_after: 0,
                };
                deliver(&registry, "chan-1", &mut sink, std::future::pending()).await
            })
        };

        wait_for_outputs(&registry, "chan-1", 2).await;
        registry.publish(&"chan-1", 1).await.unwrap();

        assert!(failing.await.unwrap().is_err());

        registry.publish(&"chan-1", 2).await.unwrap();
        assert_eq!(healthy.recv().await, Some(1));
        assert_eq!(healthy.recv().await, Some(2));
        assert_eq!(registry.subscriber_count(&"chan-1"), 1);
    }

    #[tokio::test]
    async fn test_deliver_topic_closed() {
        let registry = KeyedRegistry::<&str, u32>::new();
        let (mut sink, _peer) = mpsc::channel(16);

        let closer = {
            let registry = registry.clone();
            tokio::spawn(async move {
                wait_for_outputs(&registry, "chan-1", 1).await;
                registry.close_topic(&"chan-1");
            })
        };

        let report = deliver(&registry, "chan-1", &mut sink, std::future::pending())
            .await
            .unwrap();
        closer.await.unwrap();

        assert_eq!(report.stop, StopReason::TopicClosed);
        assert_eq!(report.forwarded, 0);
    }

    #[tokio::test]
    async fn test_cancel_while_peer_stalled() {
        let registry = KeyedRegistry::<&str, u32>::new();

        // Peer never reads, so the second send parks
        let (mut sink, _peer) = mpsc::channel(1);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                deliver(&registry, "chan-1", &mut sink, async {
                    let _ = cancel_rx.await;
                })
                .await
            })
        };

        wait_for_outputs(&registry, "chan-1", 1).await;
        registry.publish(&"chan-1", 1).await.unwrap();
        registry.publish(&"chan-1", 2).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cancel_tx.send(()).unwrap();
        let report = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.forwarded, 1);
        assert_eq!(registry.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_deliver_evicted_subscriber() {
        let config = RegistryConfig::default()
            .subscriber_capacity(1)
            .delivery(crate::broadcast::DeliveryPolicy::Evict);
        let registry = KeyedRegistry::<&str, u32>::with_config(config);
        let (mut sink, _peer) = mpsc::channel(16);

        let publisher = {
            let registry = registry.clone();
            tokio::spawn(async move {
                wait_for_outputs(&registry, "chan-1", 1).await;
                for value in 0..10 {
                    let _ = registry.publish(&"chan-1", value).await;
                }
            })
        };

        let report = deliver(&registry, "chan-1", &mut sink, std::future::pending())
            .await
            .unwrap();
        publisher.await.unwrap();

        assert_eq!(report.stop, StopReason::TopicClosed);
        assert_eq!(registry.subscriber_count(&"chan-1"), 0);
    }

    #[tokio::test]
    async fn test_dropped_while_unsubscribing_releases_topic() {
        let registry = KeyedRegistry::<&str, u32>::new();
        let (mut sink, _peer) = mpsc::channel(16);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        {
            let mut delivery = task::spawn(deliver(&registry, "chan-1", &mut sink, async {
                let _ = cancel_rx.await;
            }));

            // Waiting for the registration ack
            assert_pending!(delivery.poll());
            settle().await;

            // Cancelled, now waiting for the unregister ack
            cancel_tx.send(()).unwrap();
            assert_pending!(delivery.poll());
            assert!(registry.has_topic(&"chan-1"));
        }

        assert_eq!(registry.subscriber_count(&"chan-1"), 0);
        assert!(!registry.has_topic(&"chan-1"));
    }

    #[tokio::test]
    async fn test_aborted_delivery_task_releases_topic() {
        let registry = KeyedRegistry::<&str, u32>::new();
        let (mut sink, _peer) = mpsc::channel(16);

        let task = {
            let registry = registry.clone();
            tokio::spawn(async move {
                deliver(&registry, "chan-1", &mut sink, std::future::pending()).await
            })
        };

        wait_for_outputs(&registry, "chan-1", 1).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(!registry.has_topic(&"chan-1"));
        assert_eq!(registry.topic_count(), 0);
    }
}
