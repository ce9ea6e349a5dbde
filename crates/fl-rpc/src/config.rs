//! # RPC Configuration
//!
//! Settings shared by both sides of the protocol: broker location, client
//! identity, channel names, transport security, and the client's timeout and
//! admission ceiling.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Canonical request channel name.
pub const REQUEST_TOPIC: &str = "fl.request";

/// Canonical response channel name.
pub const RESPONSE_TOPIC: &str = "fl.response";

/// Default deadline for a single RPC call.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(15);

/// Default ceiling on concurrently in-flight calls per client.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 1000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was empty.
    #[error("setting '{0}' must be non-empty")]
    Empty(&'static str),

    /// A numeric setting was zero or unparsable.
    #[error("setting '{name}' is invalid: {reason}")]
    Invalid {
        /// Environment/setting name.
        name: &'static str,
        /// What went wrong.
        reason: String,
    },
}

/// Optional transport authentication parameters.
///
/// Carried opaquely to the broker adapter; the in-memory broker ignores them.
#[derive(Debug, Clone, Default)]
pub struct SecuritySettings {
    /// Security protocol, e.g. `SASL_SSL`.
    pub protocol: String,
    /// SASL mechanism, e.g. `SCRAM-SHA-256`.
    pub sasl_mechanism: Option<String>,
    /// SASL username.
    pub sasl_username: Option<String>,
    /// SASL password.
    pub sasl_password: Option<String>,
}

/// Settings for the RPC client and the worker runtime.
#[derive(Debug, Clone)]
pub struct RpcSettings {
    /// Broker address(es) for the transport adapter.
    pub broker_url: String,
    /// Identity this process presents to the broker and in logs.
    pub client_id: String,
    /// Consumer group the worker pool consumes requests under.
    pub group_id: String,
    /// Channel requests are published to.
    pub request_topic: String,
    /// Channel this client listens on for its responses.
    pub response_topic: String,
    /// Optional transport security parameters.
    pub security: Option<SecuritySettings>,
    /// Default deadline for a single call.
    pub rpc_timeout: Duration,
    /// Admission ceiling: maximum concurrently in-flight calls.
    pub max_in_flight: usize,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            broker_url: "fl-broker:9092".to_string(),
            client_id: "fl-engine".to_string(),
            group_id: "fl.engine".to_string(),
            request_topic: REQUEST_TOPIC.to_string(),
            response_topic: RESPONSE_TOPIC.to_string(),
            security: None,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

impl RpcSettings {
    /// Load settings from `FL_*` environment variables, falling back to
    /// defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric variable is present but does not
    /// parse, or validation fails.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let rpc_timeout = match env::var("FL_RPC_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|e| ConfigError::Invalid {
                    name: "FL_RPC_TIMEOUT_SECS",
                    reason: format!("{e}"),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => defaults.rpc_timeout,
        };

        let max_in_flight = match env::var("FL_MAX_IN_FLIGHT") {
            Ok(raw) => raw.parse().map_err(|e| ConfigError::Invalid {
                name: "FL_MAX_IN_FLIGHT",
                reason: format!("{e}"),
            })?,
            Err(_) => defaults.max_in_flight,
        };

        let security = env::var("FL_SECURITY_PROTOCOL")
            .ok()
            .filter(|p| !p.is_empty())
            .map(|protocol| SecuritySettings {
                protocol,
                sasl_mechanism: env::var("FL_SASL_MECHANISM").ok(),
                sasl_username: env::var("FL_SASL_USERNAME").ok(),
                sasl_password: env::var("FL_SASL_PASSWORD").ok(),
            });

        let settings = Self {
            broker_url: env_or("FL_BROKER_URL", defaults.broker_url),
            client_id: env_or("FL_CLIENT_ID", defaults.client_id),
            group_id: env_or("FL_GROUP_ID", defaults.group_id),
            request_topic: env_or("FL_REQUEST_TOPIC", defaults.request_topic),
            response_topic: env_or("FL_RESPONSE_TOPIC", defaults.response_topic),
            security,
            rpc_timeout,
            max_in_flight,
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any channel/identity is empty, or the timeout or
    /// admission ceiling is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::Empty("client_id"));
        }
        if self.group_id.is_empty() {
            return Err(ConfigError::Empty("group_id"));
        }
        if self.request_topic.is_empty() {
            return Err(ConfigError::Empty("request_topic"));
        }
        if self.response_topic.is_empty() {
            return Err(ConfigError::Empty("response_topic"));
        }
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "rpc_timeout",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_in_flight == 0 {
            return Err(ConfigError::Invalid {
                name: "max_in_flight",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

fn env_or(name: &str, default: String) -> String {
    env::var(name).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RpcSettings::default();
        assert_eq!(settings.request_topic, "fl.request");
        assert_eq!(settings.response_topic, "fl.response");
        assert_eq!(settings.rpc_timeout, Duration::from_secs(15));
        assert_eq!(settings.max_in_flight, 1000);
        assert!(settings.security.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_topic() {
        let settings = RpcSettings {
            request_topic: String::new(),
            ..RpcSettings::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Empty("request_topic"))
        ));
    }

    #[test]
    fn test_from_env_overrides_and_cleans_up() {
        // Only this test touches these variables; fl-rpc's other tests never
        // call from_env, so there is no cross-test interference.
        env::set_var("FL_GROUP_ID", "fl.engine.staging");
        env::set_var("FL_MAX_IN_FLIGHT", "25");
        env::set_var("FL_RPC_TIMEOUT_SECS", "3");

        let settings = RpcSettings::from_env().unwrap();
        assert_eq!(settings.group_id, "fl.engine.staging");
        assert_eq!(settings.max_in_flight, 25);
        assert_eq!(settings.rpc_timeout, Duration::from_secs(3));
        // Unset variables keep their defaults.
        assert_eq!(settings.request_topic, "fl.request");

        env::set_var("FL_MAX_IN_FLIGHT", "not a number");
        assert!(RpcSettings::from_env().is_err());

        env::remove_var("FL_GROUP_ID");
        env::remove_var("FL_MAX_IN_FLIGHT");
        env::remove_var("FL_RPC_TIMEOUT_SECS");
    }

    #[test]
    fn test_validate_rejects_zero_ceiling() {
        let settings = RpcSettings {
            max_in_flight: 0,
            ..RpcSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let settings = RpcSettings {
            rpc_timeout: Duration::ZERO,
            ..RpcSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
