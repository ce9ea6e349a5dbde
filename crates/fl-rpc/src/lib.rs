//! # FL RPC - Request/Response Calls over a Fire-and-Forget Bus
//!
//! The FunctionLab API process needs synchronous-looking calls into the math
//! engine worker pool, but the only transport between them is an asynchronous
//! publish/subscribe bus. This crate is the protocol that bridges the gap:
//!
//! - **Envelopes & codec** - request/response message shapes and their byte
//!   encoding ([`envelope`]).
//! - **Pending-call table** - correlation id to suspended-caller bookkeeping
//!   ([`pending`]).
//! - **RPC client** - admission control, send, await, timeout ([`client`]).
//! - **Response listener** - background loop resolving pending calls
//!   ([`listener`]).
//! - **Handler registry & dispatcher** - worker-side action dispatch with
//!   uniform error funneling ([`registry`], [`dispatcher`]).
//! - **Lifecycle & config** - ordered start/stop and settings ([`lifecycle`],
//!   [`config`]).
//!
//! ```text
//! caller ──call()──▶ RpcClient ──encode──▶ [fl.request] ──group──▶ Dispatcher
//!    ▲                   │                                            │
//!    │             pending table                                 HandlerRegistry
//!    │                   ▲                                            │
//!    └──── resolve ── Listener ◀──decode── [fl.response] ◀──publish───┘
//! ```
//!
//! ## Guarantees
//!
//! - Per correlation id, at most one response is accepted (first-writer-wins).
//! - No ordering across distinct correlation ids.
//! - Timeouts are client-side bookkeeping only; no cancellation reaches the
//!   worker, so late responses become orphans and are dropped.
//! - Malformed messages never abort a consume loop on either side.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod analyze;
pub mod client;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod pending;
pub mod registry;

// Re-export main types
pub use analyze::{
    AnalyzePipeline, AnalyzeRequest, AnalyzeResponse, CaretNormalizer, InputNormalizer,
    NormalizedInput, ResultPresenter, TemplatePresenter, ANALYZE_AND_PRESENT, MATH_ACTIONS,
};
pub use client::EngineRpcClient;
pub use config::{ConfigError, RpcSettings, SecuritySettings, REQUEST_TOPIC, RESPONSE_TOPIC};
pub use correlation::CorrelationId;
pub use dispatcher::RequestDispatcher;
pub use envelope::{
    decode_request, decode_response, encode_request, encode_response, ErrorInfo, Payload,
    RequestEnvelope, ResponseEnvelope,
};
pub use error::{ProtocolError, RpcError};
pub use lifecycle::WorkerRuntime;
pub use listener::ResponseListener;
pub use pending::{PendingCallTable, PendingStats};
pub use registry::{HandlerRegistry, RegistryBuilder, RegistryError};
