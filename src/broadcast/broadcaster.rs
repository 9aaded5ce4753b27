//! Broadcaster implementation
//!
//! A `Broadcaster` is a cheap, cloneable handle to one owning task. The task
//! is the only place the subscriber set is touched; handles talk to it via
//! channels.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, watch};

use super::config::{BroadcastConfig, DeliveryPolicy};
use super::error::BroadcastError;

/// Identifier of one registered output, unique per broadcaster
pub type SubscriberId = u64;

/// Requests that must be applied in submission order
enum Command<V> {
    Publish(V),
    Register {
        output: mpsc::Sender<V>,
        ack: oneshot::Sender<SubscriberId>,
    },
}

struct Unregister {
    id: SubscriberId,
    ack: Option<oneshot::Sender<()>>,
}

/// Counters written by the owning loop, readable from any handle
#[derive(Debug, Default)]
struct Counters {
    subscribers: AtomicUsize,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    evicted: AtomicU64,
}

/// Statistics for a broadcaster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Outputs currently in the subscriber set
    pub subscribers: usize,
    /// Values taken off the input buffer
    pub published: u64,
    /// Values pushed into an output
    pub delivered: u64,
    /// Values skipped for a full output (`DropNewest`)
    pub dropped: u64,
    /// Outputs removed for being full (`Evict`)
    pub evicted: u64,
}

/// Handle to a single-topic fan-out loop
///
/// Every value submitted is delivered to every output registered at the
/// time the loop takes it off the input buffer, in submission order.
pub struct Broadcaster<V> {
    commands: mpsc::Sender<Command<V>>,
    unregister: mpsc::UnboundedSender<Unregister>,
    close: Arc<watch::Sender<bool>>,
    counters: Arc<Counters>,
    output_capacity: usize,
}

impl<V> Clone for Broadcaster<V> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            unregister: self.unregister.clone(),
            close: Arc::clone(&self.close),
            counters: Arc::clone(&self.counters),
            output_capacity: self.output_capacity,
        }
    }
}

impl<V> std::fmt::Debug for Broadcaster<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broadcaster")
            .field("closed", &self.is_closed())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl<V: Clone + Send + 'static> Broadcaster<V> {
    /// Create a broadcaster with default configuration
    ///
    /// Spawns the owning task, so this must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(BroadcastConfig::default())
    }

    /// Create a broadcaster with custom configuration
    pub fn with_config(config: BroadcastConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.input_capacity.max(1));
        let (unregister_tx, unregister_rx) = mpsc::unbounded_channel();
        let (close_tx, close_rx) = watch::channel(false);
        let counters = Arc::new(Counters::default());

        let run_loop = BroadcastLoop {
            commands: commands_rx,
            unregister: unregister_rx,
            close: close_rx,
            outputs: HashMap::new(),
            next_id: 1,
            delivery: config.delivery,
            counters: Arc::clone(&counters),
        };
        tokio::spawn(run_loop.run());

        Self {
            commands: commands_tx,
            unregister: unregister_tx,
            close: Arc::new(close_tx),
            counters,
            output_capacity: config.output_capacity.max(1),
        }
    }
}

impl<V> Broadcaster<V> {
    /// Submit a value, waiting while the input buffer is full
    pub async fn submit(&self, value: V) -> Result<(), BroadcastError> {
        if self.is_closed() {
            return Err(BroadcastError::Closed);
        }

        self.commands
            .send(Command::Publish(value))
            .await
            .map_err(|_| BroadcastError::Closed)
    }

    /// Submit a value without waiting
    ///
    /// Returns `false` if the input buffer is full or the broadcaster is
    /// closed; the value is not delivered in that case.
    pub fn try_submit(&self, value: V) -> bool {
        if self.is_closed() {
            return false;
        }

        self.commands.try_send(Command::Publish(value)).is_ok()
    }

    /// Register an output
    ///
    /// Returns once the owning loop has added it. Values submitted before
    /// this call are not replayed; values submitted after it returns are
    /// delivered.
    pub async fn register(&self, output: mpsc::Sender<V>) -> Result<SubscriberId, BroadcastError> {
        if self.is_closed() {
            return Err(BroadcastError::Closed);
        }

        let (ack, acked) = oneshot::channel();
        self.commands
            .send(Command::Register { output, ack })
            .await
            .map_err(|_| BroadcastError::Closed)?;

        acked.await.map_err(|_| BroadcastError::Closed)
    }

    /// Allocate an output with the configured capacity and register it
    pub async fn subscribe(&self) -> Result<(SubscriberId, mpsc::Receiver<V>), BroadcastError> {
        let (tx, rx) = mpsc::channel(self.output_capacity);
        let id = self.register(tx).await?;
        Ok((id, rx))
    }

    /// Unregister an output and wait for the owning loop to drop it
    ///
    /// Unknown ids are ignored. The caller must keep draining the output
    /// until this returns when the `Block` policy is in use.
    pub async fn unregister(&self, id: SubscriberId) -> Result<(), BroadcastError> {
        let (ack, acked) = oneshot::channel();
        self.unregister
            .send(Unregister {
                id,
                ack: Some(ack),
            })
            .map_err(|_| BroadcastError::Closed)?;

        acked.await.map_err(|_| BroadcastError::Closed)
    }

    /// Unregister an output without waiting for the acknowledgement
    pub fn unregister_now(&self, id: SubscriberId) {
        // The loop is gone if this fails, and so is the output.
        let _ = self.unregister.send(Unregister { id, ack: None });
    }

    /// Shut the owning loop down
    ///
    /// Registered outputs are dropped, so their receivers observe the
    /// conduit closing once drained.
    pub fn close(&self) {
        if !self.close.send_replace(true) {
            tracing::debug!(
                subscribers = self.subscriber_count(),
                "Broadcaster closed"
            );
        }
    }

    /// Check if `close` was called or the owning loop has exited
    pub fn is_closed(&self) -> bool {
        *self.close.borrow() || self.commands.is_closed()
    }

    /// Check if both handles drive the same owning loop
    pub fn same_loop(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.counters, &other.counters)
    }

    /// Get the number of outputs in the subscriber set
    pub fn subscriber_count(&self) -> usize {
        self.counters.subscribers.load(Ordering::Relaxed)
    }

    /// Get the capacity used for outputs allocated by `subscribe`
    pub fn output_capacity(&self) -> usize {
        self.output_capacity
    }

    /// Get broadcaster statistics
    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            subscribers: self.counters.subscribers.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            delivered: self.counters.delivered.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }
}

impl<V: Clone + Send + 'static> Default for Broadcaster<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// The owning task
struct BroadcastLoop<V> {
    commands: mpsc::Receiver<Command<V>>,
    unregister: mpsc::UnboundedReceiver<Unregister>,
    close: watch::Receiver<bool>,
    outputs: HashMap<SubscriberId, mpsc::Sender<V>>,
    next_id: SubscriberId,
    delivery: DeliveryPolicy,
    counters: Arc<Counters>,
}

impl<V: Clone> BroadcastLoop<V> {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                changed = self.close.changed() => {
                    if changed.is_err() || *self.close.borrow() {
                        break;
                    }
                }
                Some(request) = self.unregister.recv() => {
                    self.remove(request);
                }
                command = self.commands.recv() => match command {
                    Some(Command::Publish(value)) => {
                        if !self.fan_out(value).await {
                            break;
                        }
                    }
                    Some(Command::Register { output, ack }) => self.add(output, ack),
                    // Every handle is gone
                    None => break,
                },
            }
        }

        self.outputs.clear();
        self.sync_count();
    }

    fn add(&mut self, output: mpsc::Sender<V>, ack: oneshot::Sender<SubscriberId>) {
        let id = self.next_id;
        self.next_id += 1;

        // The registering caller gave up, nobody will ever unregister this id
        if ack.send(id).is_err() {
            tracing::debug!(subscriber = id, "Registration abandoned, output dropped");
            return;
        }

        self.outputs.insert(id, output);
        self.sync_count();
        tracing::debug!(
            subscriber = id,
            subscribers = self.outputs.len(),
            "Output registered"
        );
    }

    fn remove(&mut self, request: Unregister) {
        if self.outputs.remove(&request.id).is_some() {
            self.sync_count();
            tracing::debug!(
                subscriber = request.id,
                subscribers = self.outputs.len(),
                "Output unregistered"
            );
        }

        if let Some(ack) = request.ack {
            let _ = ack.send(());
        }
    }

    /// Deliver one value to every output
    ///
    /// Returns `false` if a close signal arrived while blocked on a full
    /// output.
    async fn fan_out(&mut self, value: V) -> bool {
        self.counters.published.fetch_add(1, Ordering::Relaxed);

        let mut gone = Vec::new();
        let mut evicted = Vec::new();
        let mut closing = false;

        for (&id, output) in self.outputs.iter() {
            match output.try_send(value.clone()) {
                Ok(()) => {
                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Closed(_)) => gone.push(id),
                Err(TrySendError::Full(value)) => match self.delivery {
                    DeliveryPolicy::DropNewest => {
                        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(subscriber = id, "Output full, value dropped");
                    }
                    DeliveryPolicy::Evict => evicted.push(id),
                    DeliveryPolicy::Block => {
                        tracing::warn!(subscriber = id, "Output full, topic stalled");

                        tokio::select! {
                            biased;

                            _ = self.close.changed() => {
                                closing = true;
                                break;
                            }
                            sent = output.send(value) => match sent {
                                Ok(()) => {
                                    self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                                }
                                Err(_) => gone.push(id),
                            },
                        }
                    }
                },
            }
        }

        for id in gone {
            self.outputs.remove(&id);
            tracing::debug!(subscriber = id, "Output receiver dropped, removed");
        }

        for id in evicted {
            self.outputs.remove(&id);
            self.counters.evicted.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(subscriber = id, "Output full, subscriber evicted");
        }

        self.sync_count();
        !closing
    }

    fn sync_count(&self) {
        self.counters
            .subscribers
            .store(self.outputs.len(), Ordering::Relaxed);
    }
}
