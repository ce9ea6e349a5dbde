//! FunctionLab engine worker entry point.
//!
//! Loads settings and telemetry from the environment, wires the in-process
//! broker, starts the worker runtime and runs until Ctrl+C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use fl_bus::InMemoryBroker;
use fl_rpc::{RegistryBuilder, RpcSettings};
use fl_runtime::{required_actions_from_env, run_worker, RunOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let telemetry = fl_telemetry::TelemetryConfig::from_env("fl-worker");
    fl_telemetry::init(&telemetry).context("failed to initialize telemetry")?;

    let settings = RpcSettings::from_env().context("invalid worker settings")?;
    info!(
        broker_url = %settings.broker_url,
        group = %settings.group_id,
        request_topic = %settings.request_topic,
        "Starting FunctionLab engine worker"
    );

    let bus = Arc::new(InMemoryBroker::new());

    // Domain handlers are registered by the embedding application; a bare
    // worker serves only the built-in actions.
    let handlers = RegistryBuilder::new();
    let options = RunOptions {
        required_actions: required_actions_from_env(),
    };

    let mut runtime = run_worker(bus, handlers, settings, options)?;

    info!("Worker is running. Press Ctrl+C to stop.");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        () = runtime.wait() => {
            info!("Dispatch loop exited");
        }
    }

    runtime.stop().await;
    Ok(())
}
