//! Correlation ID linking one request to its one eventual response.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque token that ties a request to the response it produces.
///
/// Generated client-side at envelope construction; the worker copies it
/// into the response unchanged, and the pending-call table keys on it. The
/// surface is deliberately minimal: ids are created, compared, hashed, and
/// serialized, never inspected. UUID v7 makes collisions among a client's
/// in-flight calls negligible and keeps log lines time-sortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(Uuid);

impl CorrelationId {
    /// Generate a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
