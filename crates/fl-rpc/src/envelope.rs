//! # Envelopes & Codec
//!
//! Request/response message shapes and their byte encoding.
//!
//! The wire format is plain JSON carrying exactly the envelope fields, with
//! no version or schema marker: unknown fields are ignored on decode and
//! missing optional fields take their defaults, so rolling upgrades of either
//! side never fail whole messages.

use crate::config::RESPONSE_TOPIC;
use crate::correlation::CorrelationId;
use crate::error::ProtocolError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque key/value mapping carried as a call's input or output.
///
/// The protocol assumes nothing about its shape; that is the handler's
/// contract with its caller.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// Envelope for messages targeting the engine worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Requested engine action, e.g. `"domain"`.
    pub action: String,

    /// Caller-defined input for the action.
    #[serde(default)]
    pub payload: Payload,

    /// Identifier that ties request and response together.
    pub correlation_id: CorrelationId,

    /// Channel the response must be published to.
    #[serde(default = "default_reply_to")]
    pub reply_to: String,

    /// Unix timestamp (seconds) emitted by the caller.
    #[serde(default)]
    pub ts: u64,
}

impl RequestEnvelope {
    /// Build a request envelope.
    ///
    /// Generates a fresh correlation id when none is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::EmptyReplyTo`] if `reply_to` is empty; a
    /// request without a reply channel could never be answered.
    pub fn build(
        action: impl Into<String>,
        payload: Payload,
        reply_to: impl Into<String>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<Self, ProtocolError> {
        let reply_to = reply_to.into();
        if reply_to.is_empty() {
            return Err(ProtocolError::EmptyReplyTo);
        }

        Ok(Self {
            action: action.into(),
            payload,
            correlation_id: correlation_id.unwrap_or_default(),
            reply_to,
            ts: unix_ts(),
        })
    }
}

/// Structured error carried in a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Human-readable failure description from the worker.
    pub message: String,
}

/// Envelope returned by the engine worker.
///
/// Exactly one of `data` / `error` is populated, determined by `ok`; the
/// constructors below are the only way this crate builds one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Matches the originating request.
    pub correlation_id: CorrelationId,

    /// True when the action succeeded.
    pub ok: bool,

    /// Result mapping, present iff `ok`.
    #[serde(default)]
    pub data: Option<Payload>,

    /// Error information, present iff not `ok`.
    #[serde(default)]
    pub error: Option<ErrorInfo>,

    /// Unix timestamp (seconds) when the response was produced.
    #[serde(default)]
    pub ts: u64,
}

impl ResponseEnvelope {
    /// Build a successful response carrying the handler's result.
    #[must_use]
    pub fn success(correlation_id: CorrelationId, data: Payload) -> Self {
        Self {
            correlation_id,
            ok: true,
            data: Some(data),
            error: None,
            ts: unix_ts(),
        }
    }

    /// Build a failed response carrying a human-readable message.
    #[must_use]
    pub fn failure(correlation_id: CorrelationId, message: impl Into<String>) -> Self {
        Self {
            correlation_id,
            ok: false,
            data: None,
            error: Some(ErrorInfo {
                message: message.into(),
            }),
            ts: unix_ts(),
        }
    }
}

/// Encode a request envelope to wire bytes.
pub fn encode_request(request: &RequestEnvelope) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(request)?))
}

/// Decode wire bytes to a request envelope.
///
/// A decode failure is non-fatal by contract: consuming loops log it and
/// move on to the next message.
pub fn decode_request(raw: &[u8]) -> Result<RequestEnvelope, ProtocolError> {
    Ok(serde_json::from_slice(raw)?)
}

/// Encode a response envelope to wire bytes.
pub fn encode_response(response: &ResponseEnvelope) -> Result<Bytes, ProtocolError> {
    Ok(Bytes::from(serde_json::to_vec(response)?))
}

/// Decode wire bytes to a response envelope.
pub fn decode_response(raw: &[u8]) -> Result<ResponseEnvelope, ProtocolError> {
    Ok(serde_json::from_slice(raw)?)
}

fn default_reply_to() -> String {
    RESPONSE_TOPIC.to_string()
}

/// Current unix timestamp in seconds.
pub(crate) fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
