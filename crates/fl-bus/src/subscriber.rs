//! # Subscriptions
//!
//! Receiving handles for the two delivery modes of the bus.

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::debug;

/// A fan-out subscription to a topic.
///
/// Every `TopicSubscription` on a topic receives every message published
/// after it was created. Slow subscribers that fall behind the channel
/// capacity skip the dropped messages and keep receiving.
pub struct TopicSubscription {
    topic: String,
    receiver: broadcast::Receiver<Bytes>,
}

impl TopicSubscription {
    pub(crate) fn new(topic: String, receiver: broadcast::Receiver<Bytes>) -> Self {
        Self { topic, receiver }
    }

    /// Receive the next message on the topic.
    ///
    /// # Returns
    ///
    /// - `Some(payload)` - The next message
    /// - `None` - The bus was dropped
    pub async fn recv(&mut self) -> Option<Bytes> {
        loop {
            match self.receiver.recv().await {
                Ok(payload) => return Some(payload),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(
                        topic = %self.topic,
                        lagged = count,
                        "Subscriber lagged, some messages dropped"
                    );
                    continue;
                }
            }
        }
    }

    /// Get the topic this subscription listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// A consumer-group subscription to a topic.
///
/// All members of a `(topic, group)` pair drain one shared queue, so each
/// message is delivered to exactly one member. Delivery is at-most-once:
/// a message leaves the queue at delivery, and a member that crashes before
/// finishing its work loses that message (the caller's timeout covers it).
pub struct GroupSubscription {
    topic: String,
    group: String,
    receiver: Arc<Mutex<mpsc::Receiver<Bytes>>>,
}

impl GroupSubscription {
    pub(crate) fn new(
        topic: String,
        group: String,
        receiver: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    ) -> Self {
        Self {
            topic,
            group,
            receiver,
        }
    }

    /// Receive the next message assigned to this group member.
    ///
    /// # Returns
    ///
    /// - `Some(payload)` - The next message
    /// - `None` - The queue was closed (broker dropped)
    pub async fn recv(&self) -> Option<Bytes> {
        self.receiver.lock().await.recv().await
    }

    /// Get the topic this subscription consumes.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Get the consumer group name.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{ChannelPublisher, InMemoryBroker};

    #[tokio::test]
    async fn test_fanout_subscription_sees_later_messages_only() {
        let broker = InMemoryBroker::new();

        broker
            .publish("fl.response", Bytes::from_static(b"early"))
            .await
            .unwrap();

        let mut sub = broker.subscribe("fl.response");
        broker
            .publish("fl.response", Bytes::from_static(b"late"))
            .await
            .unwrap();

        assert_eq!(sub.recv().await.unwrap(), Bytes::from_static(b"late"));
        assert_eq!(sub.topic(), "fl.response");
    }

    #[tokio::test]
    async fn test_group_subscription_identity() {
        let broker = InMemoryBroker::new();
        let sub = broker.join_group("fl.request", "fl.engine");

        assert_eq!(sub.topic(), "fl.request");
        assert_eq!(sub.group(), "fl.engine");
    }

    #[tokio::test]
    async fn test_lagged_subscriber_keeps_receiving() {
        let broker = InMemoryBroker::with_capacity(2);
        let mut sub = broker.subscribe("fl.response");

        // Overflow the channel so the subscriber lags.
        for i in 0..8u8 {
            broker
                .publish("fl.response", Bytes::copy_from_slice(&[i]))
                .await
                .unwrap();
        }

        // Lagged messages are skipped; the newest survive.
        let msg = sub.recv().await.unwrap();
        assert!(!msg.is_empty());
    }
}
