//! # Configuration Management
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. built-in defaults
//! 2. an optional file (YAML, JSON or TOML, picked by extension)
//! 3. `SECRETPLANE__*` environment variables, `__` separating nested keys
//!    (e.g. `SECRETPLANE__RUNTIME__REQUEST_TIMEOUT_MS=2000`)

pub mod settings;

use std::path::Path;

use config::{Config, Environment, File};

pub use settings::{AppConfig, ObservabilityConfig, RuntimeConfig};

use crate::errors::Result;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SECRETPLANE";

/// Load and validate the application configuration.
///
/// # Errors
///
/// Returns a configuration error if the file cannot be read or parsed, a
/// value has the wrong type, or validation fails.
pub fn load(path: Option<&Path>) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path));
    }

    let config: AppConfig = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__").try_parsing(true))
        .build()?
        .try_deserialize()?;

    config.validate()?;
    Ok(config)
}
