//! # Secretplane
//!
//! A pluggable secret-store façade. Applications address secrets through
//! named store components; each component is backed by a registered backend
//! (Kubernetes, HashiCorp Vault, a local JSON file, the process environment)
//! and all of them answer through one contract with uniform errors.
//!
//! ## Architecture
//!
//! ```text
//! caller → SecretRuntime → SecretRequestRouter → StoreInstanceManager → SecretStore
//!                                 ↓                      ↓
//!                       validation, deadline     BackendRegistry (type → factory)
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use secretplane::secrets::{BackendRegistry, ComponentDescriptor};
//! use secretplane::{AppConfig, Result, SecretRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig {
//!         components: vec![
//!             ComponentDescriptor::new("env", "local.env").with_metadata("prefix", "APP_"),
//!         ],
//!         ..Default::default()
//!     };
//!
//!     let runtime = SecretRuntime::new(config, BackendRegistry::with_builtin_backends()).await?;
//!     let secret = runtime.get_secret("env", "DB_PASSWORD", HashMap::new()).await?;
//!     println!("fields: {:?}", secret.keys().collect::<Vec<_>>());
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;

// Re-export commonly used types and traits
pub use config::{AppConfig, ObservabilityConfig, RuntimeConfig};
pub use errors::{ErrorKind, Result, SecretStoreError};
pub use secrets::{
    BackendRegistry, BulkSecretRequest, BulkSecretResponse, ComponentDescriptor, SecretRequest,
    SecretRequestRouter, SecretResponse, SecretStore, StoreInstanceManager,
};

// Used by the exported span macros
#[doc(hidden)]
pub use tracing;
#[doc(hidden)]
pub use uuid;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Install the ring rustls crypto provider as the process default.
///
/// The kube and vaultrs clients both speak rustls; it refuses to pick a
/// provider on its own when more than one is compiled in. Calling this more
/// than once is harmless.
pub fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        // Another thread may win the race; either way a provider is installed
        let _ = ring::default_provider().install_default();
    }
}

/// Configured secret stores plus the router serving them
#[derive(Debug, Clone)]
pub struct SecretRuntime {
    router: SecretRequestRouter,
}

impl SecretRuntime {
    /// Build a runtime from configuration and a populated registry.
    ///
    /// Components are configured immediately; their stores are initialized on
    /// first use unless `runtime.eager_init` is set.
    ///
    /// # Errors
    ///
    /// - [`SecretStoreError::Config`] if the configuration is invalid
    /// - the first initialization error when eager init is enabled
    pub async fn new(config: AppConfig, registry: BackendRegistry) -> Result<Self> {
        config.validate()?;

        let manager = Arc::new(StoreInstanceManager::with_init_timeout(
            Arc::new(registry),
            config.runtime.init_timeout(),
        ));
        for component in config.components {
            manager.configure(component)?;
        }

        let router = SecretRequestRouter::with_default_timeout(
            Arc::clone(&manager),
            config.runtime.request_timeout(),
        );

        if config.runtime.eager_init {
            for (name, outcome) in manager.initialize_all().await {
                if let Err(e) = outcome {
                    warn!(store = %name, error = %e, "Eager secret store initialization failed");
                    return Err(e);
                }
            }
        }

        info!(
            app_name = APP_NAME,
            version = VERSION,
            stores = ?manager.store_names(),
            "Secret runtime ready"
        );

        Ok(Self { router })
    }

    /// Load configuration from an optional file plus the environment and
    /// build a runtime with every built-in backend.
    pub async fn from_config_file(path: Option<&Path>) -> Result<Self> {
        let config = crate::config::load(path)?;
        Self::new(config, BackendRegistry::with_builtin_backends()).await
    }

    /// Fetch one secret with the router's default deadline
    pub async fn get_secret(
        &self,
        store: &str,
        name: &str,
        metadata: HashMap<String, String>,
    ) -> Result<SecretResponse> {
        self.router.get_secret(store, SecretRequest::new(name).with_metadata_map(metadata)).await
    }

    /// Fetch every secret a store can enumerate
    pub async fn bulk_get_secret(
        &self,
        store: &str,
        metadata: HashMap<String, String>,
    ) -> Result<BulkSecretResponse> {
        self.router
            .bulk_get_secret(store, BulkSecretRequest::new().with_metadata_map(metadata))
            .await
    }

    pub fn router(&self) -> &SecretRequestRouter {
        &self.router
    }

    pub fn manager(&self) -> &Arc<StoreInstanceManager> {
        self.router.manager()
    }

    /// Close every initialized store
    pub async fn shutdown(&self) {
        self.manager().shutdown().await;
        info!("Secret runtime shut down");
    }
}
