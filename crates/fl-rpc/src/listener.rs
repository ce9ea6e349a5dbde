//! # Response Listener
//!
//! Background loop consuming the reply channel and resolving pending calls.

use crate::envelope;
use crate::pending::PendingCallTable;
use fl_bus::TopicSubscription;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Consumes the client's reply channel for the lifetime of the client.
///
/// Every message is decoded and matched against the pending-call table.
/// Malformed messages and responses for unknown correlation ids (already
/// resolved, timed out, or another instance's) are logged and skipped -
/// neither ever terminates the loop.
pub struct ResponseListener {
    subscription: TopicSubscription,
    pending: Arc<PendingCallTable>,
}

impl ResponseListener {
    /// Create a listener over an established reply-channel subscription.
    pub fn new(subscription: TopicSubscription, pending: Arc<PendingCallTable>) -> Self {
        Self {
            subscription,
            pending,
        }
    }

    /// Run the consume loop.
    ///
    /// Returns only when the bus is dropped or the task is cancelled.
    pub async fn run(mut self) {
        info!(topic = self.subscription.topic(), "Response listener started");

        while let Some(raw) = self.subscription.recv().await {
            let response = match envelope::decode_response(&raw) {
                Ok(response) => response,
                Err(err) => {
                    error!(error = %err, "Received malformed response payload; skipping");
                    continue;
                }
            };

            let correlation_id = response.correlation_id;
            debug!(
                correlation_id = %correlation_id,
                ok = response.ok,
                "Received response"
            );

            // complete() drops unknown/duplicate ids; that is the expected
            // path for late, duplicate, and orphaned responses.
            self.pending.complete(correlation_id, response);
        }

        info!("Response listener stopped (bus closed)");
    }
}
