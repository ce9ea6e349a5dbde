//! # Error Taxonomy
//!
//! Client-visible RPC errors and wire-level protocol errors.
//!
//! Propagation policy: transport and decode failures are handled locally and
//! never interrupt a consume loop; handler/business failures become `ok=false`
//! responses rather than transport errors; only programming-contract
//! violations (calling before start, invalid config) surface synchronously.

use fl_bus::BusError;
use std::time::Duration;
use thiserror::Error;

/// Wire-level failures while building or decoding envelopes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Bytes on the wire did not decode to a valid envelope.
    ///
    /// Logged and dropped by consuming loops; never fatal.
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A request was built without a reply channel.
    #[error("reply_to must be non-empty")]
    EmptyReplyTo,
}

/// Errors surfaced to a caller of [`EngineRpcClient::call`].
///
/// [`EngineRpcClient::call`]: crate::client::EngineRpcClient::call
#[derive(Debug, Error)]
pub enum RpcError {
    /// The client was used before `start()` (or after `stop()`).
    #[error("rpc client not started; call start() first")]
    NotStarted,

    /// Admission control rejected the call before anything was sent.
    #[error("engine overloaded: {pending} calls in flight (limit {limit})")]
    Overloaded {
        /// In-flight calls at rejection time.
        pending: usize,
        /// Configured admission ceiling.
        limit: usize,
    },

    /// No response arrived within the deadline.
    ///
    /// The pending entry is purged, but the worker may still complete and
    /// publish later; that response becomes an orphan and is discarded.
    #[error("call '{action}' timed out after {timeout:?}")]
    Timeout {
        /// Action that was called.
        action: String,
        /// Deadline that elapsed.
        timeout: Duration,
    },

    /// The worker reported `ok=false`; carries the worker-supplied message.
    #[error("engine call failed: {0}")]
    Call(String),

    /// The caller's one-shot reply channel closed before resolution.
    #[error("response channel closed before resolution")]
    ChannelClosed,

    /// Envelope construction or encoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The underlying bus failed to accept the publish.
    #[error(transparent)]
    Transport(#[from] BusError),
}
