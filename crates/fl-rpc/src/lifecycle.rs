//! # Worker Lifecycle
//!
//! Ordered start/stop of the worker-side transport pair.
//!
//! Startup order: publisher first, then the group subscription and dispatch
//! loop - a worker must be able to answer before it starts accepting.
//! Shutdown order is the reverse: cancel the dispatch loop and its
//! subscription before releasing the publisher, so in-flight processing can
//! still publish its response.

use crate::analyze::AnalyzePipeline;
use crate::config::{ConfigError, RpcSettings};
use crate::dispatcher::RequestDispatcher;
use crate::registry::HandlerRegistry;
use fl_bus::InMemoryBroker;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Holds the running worker components and the dispatcher task.
pub struct WorkerRuntime {
    settings: RpcSettings,
    dispatcher_task: Option<JoinHandle<()>>,
}

impl WorkerRuntime {
    /// Validate settings and start the worker: publisher side, then the
    /// consumer-group subscription and dispatch loop.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the settings fail validation.
    pub fn start(
        bus: Arc<InMemoryBroker>,
        registry: Arc<HandlerRegistry>,
        pipeline: AnalyzePipeline,
        settings: RpcSettings,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        info!(
            broker_url = %settings.broker_url,
            client_id = %settings.client_id,
            "Response publisher ready"
        );

        let dispatcher = RequestDispatcher::new(bus, registry, pipeline, settings.clone());
        info!(
            topic = %settings.request_topic,
            group = %settings.group_id,
            "Request consumer started"
        );
        let dispatcher_task = Some(tokio::spawn(dispatcher.run()));

        Ok(Self {
            settings,
            dispatcher_task,
        })
    }

    /// Wait for the dispatch loop to finish (it only does when the broker
    /// shuts its queues).
    pub async fn wait(&mut self) {
        if let Some(task) = self.dispatcher_task.as_mut() {
            let _ = task.await;
        }
        self.dispatcher_task = None;
    }

    /// Stop the worker: cancel the dispatch loop and its subscription, then
    /// release the publisher side.
    pub async fn stop(mut self) {
        if let Some(task) = self.dispatcher_task.take() {
            task.abort();
            let _ = task.await;
        }
        info!(
            topic = %self.settings.request_topic,
            group = %self.settings.group_id,
            "Request consumer stopped"
        );
        info!(client_id = %self.settings.client_id, "Response publisher stopped");
    }

    /// The settings this runtime runs with.
    #[must_use]
    pub fn settings(&self) -> &RpcSettings {
        &self.settings
    }
}
