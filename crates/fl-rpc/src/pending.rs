//! # Pending-Call Table
//!
//! Per-client map from correlation id to a suspended caller handle.
//!
//! Flow:
//! 1. `call()` builds an envelope and registers its correlation id here,
//!    *before* the publish completes (closing the race with an instant reply)
//! 2. The response listener receives a response and calls [`PendingCallTable::complete`]
//! 3. The caller awaits its one-shot receiver or times out
//!
//! An entry is removed exactly once, by whichever of resolution, timeout, or
//! send-error happens first. Removal and resolution are a single atomic map
//! operation, so a duplicate or late response finds nothing and is dropped
//! (first-writer-wins).

use crate::correlation::CorrelationId;
use crate::envelope::ResponseEnvelope;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// A call waiting for its response.
struct PendingCall {
    /// Channel that resumes the suspended caller.
    sender: oneshot::Sender<ResponseEnvelope>,
    /// When the call was registered.
    created_at: Instant,
    /// Deadline for this call (used by the expiry sweep).
    timeout: Duration,
    /// Action name (for logging).
    action: String,
}

/// Counters over the table's lifetime.
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Calls registered.
    pub registered: AtomicU64,
    /// Calls resolved by a response.
    pub completed: AtomicU64,
    /// Entries removed by timeout or send-error bookkeeping.
    pub cancelled: AtomicU64,
    /// Entries reaped by the expiry sweep (caller vanished).
    pub expired: AtomicU64,
}

/// Concurrent map of in-flight calls awaiting resolution.
///
/// Mutated from two logical actors - `call()` inserts, the response listener
/// resolves - which may run on different runtime threads, so every operation
/// is synchronized through the underlying concurrent map.
pub struct PendingCallTable {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: PendingStats,
}

impl PendingCallTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            stats: PendingStats::default(),
        }
    }

    /// Register an in-flight call and get the receiver its response will
    /// arrive on.
    ///
    /// Must be called before the request is published.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        action: &str,
        timeout: Duration,
    ) -> oneshot::Receiver<ResponseEnvelope> {
        let (tx, rx) = oneshot::channel();

        self.pending.insert(
            correlation_id,
            PendingCall {
                sender: tx,
                created_at: Instant::now(),
                timeout,
                action: action.to_string(),
            },
        );
        self.stats.registered.fetch_add(1, Ordering::Relaxed);

        debug!(
            correlation_id = %correlation_id,
            action = action,
            "Registered pending call"
        );

        rx
    }

    /// Resolve a pending call with its response.
    ///
    /// First-writer-wins: the entry is atomically removed, so a later arrival
    /// for the same id finds nothing. Returns whether a caller was resumed.
    pub fn complete(&self, correlation_id: CorrelationId, response: ResponseEnvelope) -> bool {
        let Some((_, call)) = self.pending.remove(&correlation_id) else {
            warn!(
                correlation_id = %correlation_id,
                "Response for unknown or already-resolved correlation id; dropping"
            );
            return false;
        };

        let waited = call.created_at.elapsed();
        match call.sender.send(response) {
            Ok(()) => {
                self.stats.completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    action = call.action,
                    waited_ms = waited.as_millis() as u64,
                    "Resolved pending call"
                );
                true
            }
            Err(_) => {
                // Caller stopped waiting between removal and send.
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(
                    correlation_id = %correlation_id,
                    action = call.action,
                    "Pending call receiver dropped before resolution"
                );
                false
            }
        }
    }

    /// Remove an entry without resolving it (timeout or send-error path).
    ///
    /// Returns whether the entry was still present.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        if self.pending.remove(correlation_id).is_some() {
            self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Reap entries older than their deadline.
    ///
    /// Callers purge their own entries on timeout; this sweep only catches
    /// entries whose caller was dropped without running its cleanup.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.pending.retain(|id, call| {
            let elapsed = now.duration_since(call.created_at);
            if elapsed > call.timeout {
                warn!(
                    correlation_id = %id,
                    action = call.action,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Removing expired pending call"
                );
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                removed += 1;
                false
            } else {
                true
            }
        });

        removed
    }

    /// Number of currently in-flight calls.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether no calls are in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Whether a correlation id is still pending.
    #[must_use]
    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.pending.contains_key(correlation_id)
    }

    /// Lifetime counters.
    #[must_use]
    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

impl Default for PendingCallTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Background sweep reaping expired entries.
///
/// Spawned by the client for its lifetime; runs until the task is aborted.
pub async fn cleanup_task(table: Arc<PendingCallTable>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let removed = table.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending calls");
        }
    }
}
