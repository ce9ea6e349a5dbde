//! # Channel Publisher
//!
//! Defines the publishing side of the bus and the in-memory broker.

use crate::subscriber::{GroupSubscription, TopicSubscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, warn};

/// Errors from bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The underlying channel was closed.
    #[error("bus channel closed")]
    Closed,

    /// Publishing to the broker failed.
    #[error("publish failed: {0}")]
    PublishFailed(String),
}

/// Trait for publishing raw messages to a topic.
///
/// This is the seam between the RPC layer and the transport: the in-memory
/// broker implements it for single-process deployments, and an external
/// broker adapter would implement the same contract.
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    /// Publish a message to a topic.
    ///
    /// Delivers to every fan-out subscriber and to exactly one member of each
    /// consumer group attached to the topic. Publishing to a topic nobody
    /// listens on is not an error.
    ///
    /// # Returns
    ///
    /// The number of fan-out subscribers that received the message.
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, BusError>;

    /// Get the total number of messages published.
    fn messages_published(&self) -> u64;
}

/// Per-topic channel state.
struct TopicState {
    /// Fan-out sender: every subscriber sees every message.
    fanout: broadcast::Sender<Bytes>,

    /// Consumer-group queues: one shared queue per group name.
    groups: HashMap<String, GroupQueue>,
}

impl TopicState {
    fn new(capacity: usize) -> Self {
        let (fanout, _) = broadcast::channel(capacity);
        Self {
            fanout,
            groups: HashMap::new(),
        }
    }
}

/// A shared work queue for one consumer group on one topic.
///
/// All members of the group drain the same receiver, so each message is
/// delivered to exactly one of them.
#[derive(Clone)]
pub(crate) struct GroupQueue {
    pub(crate) tx: mpsc::Sender<Bytes>,
    pub(crate) rx: Arc<Mutex<mpsc::Receiver<Bytes>>>,
}

impl GroupQueue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }
}

/// In-memory implementation of the bus.
///
/// Uses `tokio::sync::broadcast` for fan-out delivery and shared bounded
/// `mpsc` queues for consumer groups. Suitable for single-node operation;
/// distributed deployments would use a different implementation (e.g. Kafka)
/// behind the same `ChannelPublisher` contract.
pub struct InMemoryBroker {
    /// Channel state per topic name.
    topics: RwLock<HashMap<String, TopicState>>,

    /// Total messages published.
    messages_published: AtomicU64,

    /// Channel capacity for fan-out and group queues.
    capacity: usize,
}

impl InMemoryBroker {
    /// Create a new in-memory broker with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory broker with specified channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            messages_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe to a topic in fan-out mode.
    ///
    /// Every subscriber receives every message published to the topic after
    /// the subscription was created.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> TopicSubscription {
        let receiver = {
            let mut topics = lock_write(&self.topics);
            let state = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicState::new(self.capacity));
            state.fanout.subscribe()
        };

        debug!(topic = topic, "New fan-out subscription created");
        TopicSubscription::new(topic.to_string(), receiver)
    }

    /// Join a consumer group on a topic.
    ///
    /// Each message published to the topic is delivered to exactly one member
    /// of the group. Delivery is at-most-once: a message leaves the queue
    /// when received, so a member that crashes mid-processing loses it.
    #[must_use]
    pub fn join_group(&self, topic: &str, group: &str) -> GroupSubscription {
        let queue = {
            let mut topics = lock_write(&self.topics);
            let state = topics
                .entry(topic.to_string())
                .or_insert_with(|| TopicState::new(self.capacity));
            state
                .groups
                .entry(group.to_string())
                .or_insert_with(|| GroupQueue::new(self.capacity))
                .clone()
        };

        debug!(topic = topic, group = group, "Joined consumer group");
        GroupSubscription::new(topic.to_string(), group.to_string(), queue.rx)
    }

    /// Get the number of fan-out subscribers on a topic.
    #[must_use]
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = lock_read(&self.topics);
        topics
            .get(topic)
            .map_or(0, |state| state.fanout.receiver_count())
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot the fan-out sender and group queues for a topic.
    fn delivery_targets(&self, topic: &str) -> (broadcast::Sender<Bytes>, Vec<mpsc::Sender<Bytes>>) {
        let mut topics = lock_write(&self.topics);
        let state = topics
            .entry(topic.to_string())
            .or_insert_with(|| TopicState::new(self.capacity));
        let group_txs = state.groups.values().map(|q| q.tx.clone()).collect();
        (state.fanout.clone(), group_txs)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelPublisher for InMemoryBroker {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<usize, BusError> {
        // Clone senders out of the lock; the actual sends may suspend.
        let (fanout, group_txs) = self.delivery_targets(topic);

        // Always increment counter (publish was attempted)
        self.messages_published.fetch_add(1, Ordering::Relaxed);

        for tx in group_txs {
            if tx.send(payload.clone()).await.is_err() {
                warn!(topic = topic, "Consumer group queue closed; message dropped");
            }
        }

        match fanout.send(payload) {
            Ok(receiver_count) => {
                debug!(
                    topic = topic,
                    receivers = receiver_count,
                    "Message published"
                );
                Ok(receiver_count)
            }
            Err(_) => {
                // No fan-out receivers; group members may still have seen it.
                debug!(topic = topic, "Message published with no fan-out receivers");
                Ok(0)
            }
        }
    }

    fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }
}

fn lock_read<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock_write<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
