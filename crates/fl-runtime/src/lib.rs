//! # FunctionLab Worker Runtime
//!
//! Composition root for the engine worker. This library wires the broker,
//! handler registry and dispatch loop together; the `fl-worker` binary is a
//! thin shell around [`run_worker`].
//!
//! ## Startup sequence
//!
//! 1. Load settings from the environment
//! 2. Initialize telemetry
//! 3. Build the handler registry (built-ins plus application handlers)
//! 4. Validate registry completeness
//! 5. Start the worker runtime (publisher, then consumer)
//! 6. Run until shutdown is requested
//!
//! Domain handlers (the symbolic math actions) live in the embedding
//! application, not here; they are registered through the
//! [`RegistryBuilder`] passed to [`run_worker`]. The runtime itself only
//! contributes the `ping` health action.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use fl_bus::InMemoryBroker;
use fl_rpc::{
    AnalyzePipeline, Payload, RegistryBuilder, RpcSettings, WorkerRuntime,
};

/// Health-check action every worker answers.
pub const PING_ACTION: &str = "ping";

/// Actions every worker must serve before it starts consuming. Application
/// handlers are validated on top of this set via
/// [`RunOptions::required_actions`].
pub const BUILTIN_ACTIONS: &[&str] = &[PING_ACTION];

/// Optional knobs for [`run_worker`].
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Actions the deployment promises to serve, checked against the
    /// registry at startup. Missing entries abort startup instead of
    /// surfacing as per-call `unsupported action` responses later.
    pub required_actions: Vec<String>,
}

/// Register the runtime's built-in actions on top of the application's.
fn with_builtins(builder: RegistryBuilder) -> RegistryBuilder {
    builder.register(PING_ACTION, |_payload: Payload| async move {
        let mut pong = Payload::new();
        pong.insert("pong".into(), json!(true));
        Ok(pong)
    })
}

/// Build the registry, validate it, and start the worker.
///
/// The returned [`WorkerRuntime`] is already consuming; callers typically
/// `wait()` on it or hold it until shutdown and then `stop()` it.
///
/// # Errors
///
/// Fails if the settings do not validate or the registry is missing any of
/// the built-in or required actions.
pub fn run_worker(
    bus: Arc<InMemoryBroker>,
    handlers: RegistryBuilder,
    settings: RpcSettings,
    options: RunOptions,
) -> Result<WorkerRuntime> {
    let registry = Arc::new(with_builtins(handlers).build());

    registry
        .require(BUILTIN_ACTIONS)
        .context("built-in actions missing from registry")?;
    let required: Vec<&str> = options.required_actions.iter().map(String::as_str).collect();
    registry
        .require(&required)
        .context("required actions missing from registry")?;

    info!(actions = ?registry.actions(), "Handler registry validated");

    let runtime = WorkerRuntime::start(bus, registry, AnalyzePipeline::default(), settings)
        .context("failed to start worker runtime")?;

    Ok(runtime)
}

/// Read the comma-separated `FL_REQUIRED_ACTIONS` list, if set.
#[must_use]
pub fn required_actions_from_env() -> Vec<String> {
    std::env::var("FL_REQUIRED_ACTIONS")
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
