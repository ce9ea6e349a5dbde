//! # RPC Client
//!
//! Issues calls to the engine worker pool: admission-controls, publishes the
//! request, awaits resolution through the pending-call table, and enforces
//! the deadline.

use crate::config::RpcSettings;
use crate::envelope::{self, Payload, RequestEnvelope};
use crate::error::RpcError;
use crate::listener::ResponseListener;
use crate::pending::{self, PendingCallTable};
use fl_bus::{ChannelPublisher, InMemoryBroker};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Interval between pending-table expiry sweeps.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(30);

/// Background tasks owned by a started client.
struct ClientTasks {
    listener: JoinHandle<()>,
    cleanup: JoinHandle<()>,
}

/// An admission slot held for the duration of one call.
///
/// Released on drop, so every exit path - resolution, timeout, send error,
/// or the calling future being dropped - gives the slot back exactly once.
struct InFlightSlot<'a>(&'a AtomicUsize);

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Client side of the engine RPC protocol.
///
/// One instance per process; callers share it and await responses keyed by
/// correlation id. Lifetime is tied to explicit [`start`](Self::start) /
/// [`stop`](Self::stop), not process lifetime.
pub struct EngineRpcClient {
    settings: RpcSettings,
    bus: Arc<InMemoryBroker>,
    pending: Arc<PendingCallTable>,
    /// Admitted calls currently inside `call_with_timeout`.
    in_flight: AtomicUsize,
    started: AtomicBool,
    tasks: Mutex<Option<ClientTasks>>,
}

impl EngineRpcClient {
    /// Create a client over the given bus. Call [`start`](Self::start) before
    /// issuing calls.
    #[must_use]
    pub fn new(bus: Arc<InMemoryBroker>, settings: RpcSettings) -> Self {
        Self {
            settings,
            bus,
            pending: Arc::new(PendingCallTable::new()),
            in_flight: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            tasks: Mutex::new(None),
        }
    }

    /// Start the client: publisher side first, then the response listener and
    /// the pending-table sweep. Idempotent.
    pub async fn start(&self) {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            return;
        }

        info!(
            broker_url = %self.settings.broker_url,
            client_id = %self.settings.client_id,
            request_topic = %self.settings.request_topic,
            response_topic = %self.settings.response_topic,
            "Request publisher ready"
        );

        let subscription = self.bus.subscribe(&self.settings.response_topic);
        let listener = ResponseListener::new(subscription, Arc::clone(&self.pending));
        let listener = tokio::spawn(listener.run());
        let cleanup = tokio::spawn(pending::cleanup_task(
            Arc::clone(&self.pending),
            CLEANUP_INTERVAL,
        ));

        *tasks = Some(ClientTasks { listener, cleanup });
        self.started.store(true, Ordering::SeqCst);

        info!(client_id = %self.settings.client_id, "Engine RPC client started");
    }

    /// Stop the client: subscriber-side tasks first, then the publisher side,
    /// so in-flight resolution finishes before transport resources go away.
    pub async fn stop(&self) {
        self.started.store(false, Ordering::SeqCst);

        let Some(tasks) = self.tasks.lock().await.take() else {
            return;
        };

        tasks.listener.abort();
        tasks.cleanup.abort();
        let _ = tasks.listener.await;
        let _ = tasks.cleanup.await;
        info!("Response listener stopped");

        info!(client_id = %self.settings.client_id, "Engine RPC client stopped");
    }

    /// Call an engine action with the configured default timeout.
    ///
    /// # Errors
    ///
    /// See [`call_with_timeout`](Self::call_with_timeout).
    pub async fn call(&self, action: &str, payload: Payload) -> Result<Payload, RpcError> {
        self.call_with_timeout(action, payload, self.settings.rpc_timeout)
            .await
    }

    /// Call an engine action and await its response up to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`RpcError::NotStarted`] if [`start`](Self::start) has not run.
    /// - [`RpcError::Overloaded`] if the in-flight ceiling is reached;
    ///   nothing is published.
    /// - [`RpcError::Call`] if the worker answered `ok=false`.
    /// - [`RpcError::Timeout`] if no response arrived in time; the pending
    ///   entry is purged and a late response becomes an orphan.
    /// - [`RpcError::Transport`] / [`RpcError::Protocol`] on send failures;
    ///   the pending entry is purged.
    pub async fn call_with_timeout(
        &self,
        action: &str,
        payload: Payload,
        timeout: Duration,
    ) -> Result<Payload, RpcError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(RpcError::NotStarted);
        }

        // Admission control: reserve a slot atomically before anything
        // touches the wire. Check-then-register would let two racing calls
        // both pass the check and exceed the ceiling.
        let admitted = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.settings.max_in_flight).then_some(n + 1)
            });
        if admitted.is_err() {
            let pending_now = self.in_flight.load(Ordering::SeqCst);
            warn!(
                action = action,
                pending = pending_now,
                limit = self.settings.max_in_flight,
                "Rejecting call; admission ceiling reached"
            );
            return Err(RpcError::Overloaded {
                pending: pending_now,
                limit: self.settings.max_in_flight,
            });
        }
        let _slot = InFlightSlot(&self.in_flight);

        let request = RequestEnvelope::build(
            action,
            payload,
            self.settings.response_topic.clone(),
            None,
        )?;
        let correlation_id = request.correlation_id;

        // Register before publishing so an instant reply cannot race the
        // table insert.
        let rx = self
            .pending
            .register(correlation_id, action, timeout);

        info!(
            action = action,
            correlation_id = %correlation_id,
            reply_to = %request.reply_to,
            "Sending engine request"
        );

        let raw = match envelope::encode_request(&request) {
            Ok(raw) => raw,
            Err(err) => {
                self.pending.cancel(&correlation_id);
                return Err(err.into());
            }
        };

        if let Err(err) = self.bus.publish(&self.settings.request_topic, raw).await {
            self.pending.cancel(&correlation_id);
            return Err(err.into());
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => {
                info!(
                    action = action,
                    correlation_id = %correlation_id,
                    ok = response.ok,
                    "Engine call resolved"
                );

                if response.ok {
                    Ok(response.data.unwrap_or_default())
                } else {
                    let message = response
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "engine call failed".to_string());
                    Err(RpcError::Call(message))
                }
            }
            Ok(Err(_)) => {
                // One-shot sender dropped without a response (e.g. the entry
                // was reaped by the expiry sweep).
                self.pending.cancel(&correlation_id);
                Err(RpcError::ChannelClosed)
            }
            Err(_) => {
                self.pending.cancel(&correlation_id);
                warn!(
                    action = action,
                    correlation_id = %correlation_id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Engine call timed out"
                );
                Err(RpcError::Timeout {
                    action: action.to_string(),
                    timeout,
                })
            }
        }
    }

    /// Number of currently admitted in-flight calls.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The pending-call table (for tests and diagnostics).
    #[must_use]
    pub fn pending(&self) -> &PendingCallTable {
        &self.pending
    }

    /// The settings this client runs with.
    #[must_use]
    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }
}
