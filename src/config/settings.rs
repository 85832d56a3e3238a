//! # Configuration Settings
//!
//! Defines the configuration structure of the secret runtime.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{Result, SecretStoreError};
use crate::secrets::ComponentDescriptor;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Request routing and initialization behaviour
    #[validate(nested)]
    pub runtime: RuntimeConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,

    /// Named secret store components
    #[validate(nested)]
    pub components: Vec<ComponentDescriptor>,
}

impl AppConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SecretStoreError::from)?;

        self.validate_custom()?;

        Ok(())
    }

    /// Checks the validator derive cannot express
    fn validate_custom(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for component in &self.components {
            if !seen.insert(component.name.as_str()) {
                return Err(SecretStoreError::config(format!(
                    "Duplicate secret store component name '{}'",
                    component.name
                )));
            }
        }

        Ok(())
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Default deadline for one backend call, in milliseconds
    #[validate(range(min = 1, max = 600000, message = "Request timeout must be between 1ms and 10 minutes"))]
    pub request_timeout_ms: u64,

    /// Bound on one store initialization, in milliseconds
    #[validate(range(min = 1, max = 600000, message = "Init timeout must be between 1ms and 10 minutes"))]
    pub init_timeout_ms: u64,

    /// Initialize every component at startup instead of on first use
    pub eager_init: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self { request_timeout_ms: 5000, init_timeout_ms: 30000, eager_init: false }
    }
}

impl RuntimeConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name attached to startup logs
    #[validate(length(min = 1, message = "Service name cannot be empty"))]
    pub service_name: String,

    /// Log level or filter directive (trace, debug, info, warn, error)
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: crate::APP_NAME.to_string(),
            log_level: "info".to_string(),
            json_logging: false,
        }
    }
}
