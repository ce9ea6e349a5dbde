//! # FunctionLab RPC Test Suite
//!
//! Unified test crate exercising the RPC protocol end to end: client and
//! worker over the in-memory broker.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── roundtrip.rs   # Full call/response flows, correlation matching
//!     ├── admission.rs   # In-flight ceiling, timeouts, pending hygiene
//!     └── resilience.rs  # Malformed, orphan and duplicate traffic
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p fl-tests
//! cargo test -p fl-tests integration::roundtrip
//! ```

#![allow(dead_code)]

pub mod integration;
