//! # Request Dispatcher
//!
//! Worker-side consume loop: decode a request, look up its handler, invoke
//! it, and publish the response to the request's reply channel.
//!
//! Error funneling is uniform: an unknown action or a failing handler becomes
//! an `ok=false` response, never a crash; malformed bytes and publish
//! failures are logged and the loop moves on. Full diagnostic detail stays in
//! the local logs - the wire only ever carries the handler's message.

use crate::analyze::{AnalyzePipeline, ANALYZE_AND_PRESENT};
use crate::config::RpcSettings;
use crate::envelope::{self, RequestEnvelope, ResponseEnvelope};
use crate::registry::HandlerRegistry;
use fl_bus::{ChannelPublisher, GroupSubscription, InMemoryBroker};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Consumes the request channel as one member of the worker consumer group.
///
/// Each request is delivered to exactly one dispatcher in the group, so the
/// worker pool scales horizontally by adding instances. Within one instance,
/// handlers are awaited sequentially as consumed; one handler's failure
/// cannot block or crash processing of subsequent messages.
pub struct RequestDispatcher {
    settings: RpcSettings,
    bus: Arc<InMemoryBroker>,
    registry: Arc<HandlerRegistry>,
    pipeline: AnalyzePipeline,
    subscription: GroupSubscription,
}

impl RequestDispatcher {
    /// Create a dispatcher and join the configured consumer group.
    #[must_use]
    pub fn new(
        bus: Arc<InMemoryBroker>,
        registry: Arc<HandlerRegistry>,
        pipeline: AnalyzePipeline,
        settings: RpcSettings,
    ) -> Self {
        let subscription = bus.join_group(&settings.request_topic, &settings.group_id);
        Self {
            settings,
            bus,
            registry,
            pipeline,
            subscription,
        }
    }

    /// Run the consume loop.
    ///
    /// Returns only when the bus is dropped or the task is cancelled.
    pub async fn run(self) {
        info!(
            topic = self.subscription.topic(),
            group = self.subscription.group(),
            actions = ?self.registry.actions(),
            "Request dispatcher started"
        );

        while let Some(raw) = self.subscription.recv().await {
            let request = match envelope::decode_request(&raw) {
                Ok(request) => request,
                Err(err) => {
                    error!(error = %err, "Received invalid request payload; skipping");
                    continue;
                }
            };

            info!(
                action = %request.action,
                correlation_id = %request.correlation_id,
                reply_to = %request.reply_to,
                "Engine received request"
            );

            let response = self.respond_to(&request).await;

            let reply_topic = if request.reply_to.is_empty() {
                self.settings.response_topic.as_str()
            } else {
                request.reply_to.as_str()
            };

            let encoded = match envelope::encode_response(&response) {
                Ok(encoded) => encoded,
                Err(err) => {
                    error!(
                        correlation_id = %response.correlation_id,
                        error = %err,
                        "Failed to encode response; dropping"
                    );
                    continue;
                }
            };

            match self.bus.publish(reply_topic, encoded).await {
                Ok(_) => {
                    info!(
                        correlation_id = %response.correlation_id,
                        ok = response.ok,
                        topic = reply_topic,
                        "Engine sent response"
                    );
                }
                Err(err) => {
                    error!(
                        correlation_id = %response.correlation_id,
                        topic = reply_topic,
                        error = %err,
                        "Failed to publish response"
                    );
                }
            }
        }

        info!("Request dispatcher stopped (bus closed)");
    }

    /// Build the response for one request. Pure dispatch; no bus I/O.
    async fn respond_to(&self, request: &RequestEnvelope) -> ResponseEnvelope {
        let correlation_id = request.correlation_id;

        // Meta-action: the true domain action is nested in the payload and
        // dispatched through the analyze pipeline, not the outer registry key.
        if request.action == ANALYZE_AND_PRESENT {
            return match self
                .pipeline
                .run(&self.registry, request.payload.clone())
                .await
            {
                Ok(data) => ResponseEnvelope::success(correlation_id, data),
                Err(exc) => {
                    error!(
                        correlation_id = %correlation_id,
                        error = ?exc,
                        "Analyze pipeline failed"
                    );
                    ResponseEnvelope::failure(correlation_id, exc.to_string())
                }
            };
        }

        let Some(handler) = self.registry.get(&request.action) else {
            warn!(action = %request.action, "Unsupported action received");
            return ResponseEnvelope::failure(
                correlation_id,
                format!("unsupported action '{}'", request.action),
            );
        };

        match handler(request.payload.clone()).await {
            Ok(data) => ResponseEnvelope::success(correlation_id, data),
            Err(exc) => {
                // Full chain stays in local logs; only the message crosses
                // the wire.
                error!(
                    action = %request.action,
                    correlation_id = %correlation_id,
                    error = ?exc,
                    "Handler failed"
                );
                ResponseEnvelope::failure(correlation_id, exc.to_string())
            }
        }
    }
}
