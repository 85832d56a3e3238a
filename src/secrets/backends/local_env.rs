//! Environment variable secret store.
//!
//! Reads secrets straight from the process environment. Intended for
//! **development and testing only**.
//!
//! # Security Warning
//!
//! Environment variables are visible in process listings and carry no access
//! control or audit trail. Use Vault or Kubernetes for production secrets.
//!
//! # Metadata
//!
//! | key      | required | meaning                                   |
//! |----------|----------|-------------------------------------------|
//! | `prefix` | no       | prepended to every requested secret name  |
//!
//! ```bash
//! export APP_DB_PASSWORD="hunter2"
//! ```
//!
//! With `prefix: APP_`, a request for `DB_PASSWORD` returns
//! `{"DB_PASSWORD": "hunter2"}`.

use std::env;

use async_trait::async_trait;
use tracing::debug;

use crate::errors::{Result, SecretStoreError};
use crate::secrets::contract::SecretStore;
use crate::secrets::metadata::ComponentMetadata;
use crate::secrets::types::{
    BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse,
};

const BACKEND_TYPE: &str = "local.env";

/// Environment variable secret store (development only).
#[derive(Debug, Clone, Default)]
pub struct LocalEnvSecretStore {
    prefix: String,
    initialized: bool,
}

impl LocalEnvSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts a secret name to the environment variable it is read from.
    fn env_var_name(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized {
            Ok(())
        } else {
            Err(SecretStoreError::not_initialized(BACKEND_TYPE))
        }
    }
}

#[async_trait]
impl SecretStore for LocalEnvSecretStore {
    async fn init(&mut self, metadata: &ComponentMetadata) -> Result<()> {
        self.prefix = metadata.get_or("prefix", "").to_string();
        self.initialized = true;
        debug!(prefix = %self.prefix, "Initialized environment secret store");
        Ok(())
    }

    async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse> {
        self.ensure_initialized()?;

        let env_var = self.env_var_name(&request.name);
        match env::var(&env_var) {
            Ok(value) => Ok(SecretResponse::new().with_field(request.name.clone(), value)),
            Err(env::VarError::NotPresent) => Err(SecretStoreError::not_found(&request.name)),
            Err(env::VarError::NotUnicode(_)) => Err(SecretStoreError::backend_failure(
                BACKEND_TYPE,
                format!("environment variable {} is not valid unicode", env_var),
            )),
        }
    }

    async fn bulk_get_secret(&self, _request: &BulkSecretRequest) -> Result<BulkSecretResponse> {
        self.ensure_initialized()?;

        let mut secrets = BulkSecretResponse::new();
        for (key, value) in env::vars_os() {
            // A non-unicode name can never be requested, so it is not listed
            let Some(name) = key.to_str().and_then(|k| k.strip_prefix(self.prefix.as_str())) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let value = value.into_string().map_err(|_| {
                SecretStoreError::backend_failure(
                    BACKEND_TYPE,
                    format!("environment variable {}{} is not valid unicode", self.prefix, name),
                )
            })?;
            secrets.insert(name.to_string(), SecretResponse::new().with_field(name, value));
        }

        Ok(secrets)
    }

    fn features(&self) -> Vec<Feature> {
        vec![Feature::BulkGet]
    }

    fn backend_type(&self) -> &'static str {
        BACKEND_TYPE
    }
}
