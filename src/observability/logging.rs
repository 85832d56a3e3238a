//! # Structured Logging
//!
//! Subscriber setup and span macros built on the `tracing` ecosystem.
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the configured
//! log level. JSON output includes the current span, so every event emitted
//! while serving a request carries its `store`, `operation` and
//! `operation_id` fields.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{Result, SecretStoreError};

/// Create a tracing span for one secret store operation.
///
/// ```rust,ignore
/// let span = store_span!("vault", "get_secret", secret = %name);
/// ```
#[macro_export]
macro_rules! store_span {
    ($store:expr, $operation:expr) => {
        $crate::tracing::info_span!(
            "secret_store_operation",
            store = %$store,
            operation = %$operation,
            operation_id = %$crate::uuid::Uuid::new_v4()
        )
    };
    ($store:expr, $operation:expr, $($field:tt)*) => {
        $crate::tracing::info_span!(
            "secret_store_operation",
            store = %$store,
            operation = %$operation,
            operation_id = %$crate::uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for store initialization
#[macro_export]
macro_rules! init_span {
    ($store:expr, $backend_type:expr) => {
        $crate::tracing::info_span!(
            "secret_store_init",
            store = %$store,
            backend_type = %$backend_type,
            attempt_id = %$crate::uuid::Uuid::new_v4()
        )
    };
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns a configuration error if the log level does not parse or a global
/// subscriber is already installed.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level).map_err(|e| {
            SecretStoreError::config(format!("Invalid log level '{}': {}", config.log_level, e))
        })?,
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json_logging {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(false),
            )
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| {
        SecretStoreError::config(format!("Failed to install tracing subscriber: {}", e))
    })
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        service_name = %config.observability.service_name,
        components = config.components.len(),
        request_timeout_ms = config.runtime.request_timeout_ms,
        init_timeout_ms = config.runtime.init_timeout_ms,
        eager_init = config.runtime.eager_init,
        "Secret runtime configuration"
    );
}
