//! # FL Bus - Publish/Subscribe Transport for the Engine RPC Layer
//!
//! Byte-oriented pub/sub channels with two delivery modes:
//!
//! - **Fan-out**: every plain subscriber of a topic receives every message
//!   (used for reply channels, where each caller filters by correlation id).
//! - **Consumer groups**: each message on a topic is delivered to exactly one
//!   member of each named group (used for the request channel, so the worker
//!   pool can scale horizontally).
//!
//! ```text
//! ┌──────────┐  publish("fl.request")   ┌─────────────────────┐
//! │  Caller   │ ───────────────────────▶ │  group "fl.engine"  │──▶ one worker
//! └──────────┘                          └─────────────────────┘
//!       ▲                                ┌─────────────────────┐
//!       └──────────────────────────────── │ fan-out subscribers │◀── worker
//!            subscribe("fl.response")    └─────────────────────┘  publish
//! ```
//!
//! The bus itself is fire-and-forget: no request/response semantics, no
//! ordering across topics, no delivery acknowledgements. The RPC protocol in
//! `fl-rpc` layers correlation on top.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use publisher::{BusError, ChannelPublisher, InMemoryBroker};
pub use subscriber::{GroupSubscription, TopicSubscription};

/// Maximum messages to buffer per subscriber/group queue before backpressure.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
