//! # Handler Registry
//!
//! Worker-side static map from action name to an async handler function.
//!
//! A handler is the boundary to the domain logic (symbolic math, LLM
//! pipelines, persistence - all external to this crate): an async function
//! from a payload mapping to a result mapping, or an error with a
//! human-readable message. The dispatcher assumes nothing else about it.
//!
//! The registry is immutable after worker startup: build it with
//! [`RegistryBuilder`], validate completeness with
//! [`HandlerRegistry::require`], then hand it to the dispatcher.

use crate::envelope::Payload;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Boxed future returned by an action handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = anyhow::Result<Payload>> + Send>>;

/// Uniform handler capability: payload in, result mapping or error out.
pub type ActionHandler = Arc<dyn Fn(Payload) -> HandlerFuture + Send + Sync>;

/// Registry validation errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Required actions have no registered handler.
    #[error("no handler registered for action(s): {}", .0.join(", "))]
    MissingActions(Vec<String>),
}

/// Builder for a [`HandlerRegistry`].
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, ActionHandler>,
}

impl RegistryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for an action name.
    ///
    /// Re-registering an action replaces the previous handler; last one wins.
    #[must_use]
    pub fn register<F, Fut>(mut self, action: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        self.handlers.insert(
            action.into(),
            Arc::new(move |payload| Box::pin(handler(payload))),
        );
        self
    }

    /// Freeze the registry.
    #[must_use]
    pub fn build(self) -> HandlerRegistry {
        HandlerRegistry {
            handlers: self.handlers,
        }
    }
}

/// Immutable action-name to handler map.
pub struct HandlerRegistry {
    handlers: HashMap<String, ActionHandler>,
}

impl HandlerRegistry {
    /// Look up the handler for an action.
    #[must_use]
    pub fn get(&self, action: &str) -> Option<&ActionHandler> {
        self.handlers.get(action)
    }

    /// Whether a handler is registered for an action.
    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Registered action names.
    #[must_use]
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }

    /// Number of registered actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Validate that every named action has a handler.
    ///
    /// Run once at worker startup, not per call.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingActions`] listing every absent action.
    pub fn require(&self, actions: &[&str]) -> Result<(), RegistryError> {
        let missing: Vec<String> = actions
            .iter()
            .filter(|a| !self.contains(a))
            .map(|a| (*a).to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::MissingActions(missing))
        }
    }
}
