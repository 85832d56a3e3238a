//! Vault secret store
//!
//! Fetches secrets from a HashiCorp Vault KV v2 engine. Each secret is one KV
//! path; every field stored at that path becomes a response entry.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info};
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::kv2;

use crate::errors::{Result, SecretStoreError};
use crate::secrets::contract::SecretStore;
use crate::secrets::metadata::ComponentMetadata;
use crate::secrets::types::{
    BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse,
};

const BACKEND_TYPE: &str = "hashicorp.vault";
const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";
const DEFAULT_ENGINE_PATH: &str = "secret";
const DEFAULT_KV_PREFIX: &str = "dapr";
const VERSION_KEY: &str = "version_id";

/// Connection settings parsed from component metadata
#[derive(Debug, Clone, PartialEq, Eq)]
struct VaultStoreConfig {
    address: String,
    engine_path: String,
    kv_prefix: Option<String>,
    namespace: Option<String>,
    skip_verify: bool,
}

impl VaultStoreConfig {
    fn from_metadata(metadata: &ComponentMetadata) -> Result<Self> {
        let kv_prefix = if metadata.get_bool("vaultKVUsePrefix", true)? {
            Some(metadata.get_or("vaultKVPrefix", DEFAULT_KV_PREFIX).trim_matches('/').to_string())
        } else {
            None
        };

        Ok(Self {
            address: metadata.get_or("vaultAddr", DEFAULT_ADDRESS).to_string(),
            engine_path: metadata.get_or("enginePath", DEFAULT_ENGINE_PATH).to_string(),
            kv_prefix: kv_prefix.filter(|p| !p.is_empty()),
            namespace: metadata.get("vaultNamespace").map(str::to_string),
            skip_verify: metadata.get_bool("skipVerify", false)?,
        })
    }

    /// KV path of a secret, relative to the engine mount
    fn secret_path(&self, name: &str) -> String {
        match &self.kv_prefix {
            Some(prefix) => format!("{}/{}", prefix, name),
            None => name.to_string(),
        }
    }

    fn list_path(&self) -> &str {
        self.kv_prefix.as_deref().unwrap_or("")
    }
}

/// Resolve the token from `vaultToken` or the file named by `vaultTokenMountPath`
async fn resolve_token(metadata: &ComponentMetadata) -> Result<String> {
    if let Some(token) = metadata.get("vaultToken") {
        return Ok(token.to_string());
    }

    let Some(path) = metadata.get("vaultTokenMountPath") else {
        return Err(SecretStoreError::invalid_metadata(
            "vaultToken",
            "one of vaultToken or vaultTokenMountPath is required",
        ));
    };

    let token = tokio::fs::read_to_string(path).await.map_err(|e| {
        SecretStoreError::invalid_metadata("vaultTokenMountPath", format!("cannot read token file: {}", e))
    })?;
    let token = token.trim();
    if token.is_empty() {
        return Err(SecretStoreError::invalid_metadata("vaultTokenMountPath", "token file is empty"));
    }
    Ok(token.to_string())
}

struct Connection {
    client: VaultClient,
    config: VaultStoreConfig,
}

/// HashiCorp Vault KV v2 secret store
#[derive(Default)]
pub struct VaultSecretStore {
    connection: Option<Connection>,
}

impl std::fmt::Debug for VaultSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultSecretStore")
            .field("config", &self.connection.as_ref().map(|c| &c.config))
            .field("client", &self.connection.as_ref().map(|_| "[VaultClient]"))
            .finish()
    }
}

impl VaultSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or_else(|| SecretStoreError::not_initialized(BACKEND_TYPE))
    }

    async fn read_secret(&self, name: &str, version: Option<u64>) -> Result<SecretResponse> {
        let Connection { client, config } = self.connection()?;
        let path = config.secret_path(name);

        debug!(path = %path, engine = %config.engine_path, version = ?version, "Fetching secret from Vault");

        let result: std::result::Result<HashMap<String, Value>, ClientError> = match version {
            Some(version) => kv2::read_version(client, &config.engine_path, &path, version).await,
            None => kv2::read(client, &config.engine_path, &path).await,
        };

        match result {
            Ok(data) => Ok(render_fields(data)),
            Err(ClientError::APIError { code: 404, .. }) => Err(SecretStoreError::not_found(name)),
            Err(e) => {
                error!(path = %path, error = %e, "Failed to fetch secret from Vault");
                Err(SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))
            }
        }
    }
}

#[async_trait]
impl SecretStore for VaultSecretStore {
    async fn init(&mut self, metadata: &ComponentMetadata) -> Result<()> {
        let config = VaultStoreConfig::from_metadata(metadata)?;
        let token = resolve_token(metadata).await?;

        crate::install_rustls_provider();

        let mut settings_builder = VaultClientSettingsBuilder::default();
        settings_builder.address(&config.address).token(token).verify(!config.skip_verify);
        if let Some(ref namespace) = config.namespace {
            settings_builder.namespace(Some(namespace.clone()));
        }

        let settings = settings_builder
            .build()
            .map_err(|e| SecretStoreError::invalid_metadata("vaultAddr", e.to_string()))?;

        let client = VaultClient::new(settings)
            .map_err(|e| SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))?;

        info!(address = %config.address, engine = %config.engine_path, "Initialized Vault secret store");

        self.connection = Some(Connection { client, config });
        Ok(())
    }

    async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse> {
        let version = request
            .metadata_value(VERSION_KEY)
            .map(|v| {
                v.parse::<u64>().ok().filter(|version| *version > 0).ok_or_else(|| {
                    SecretStoreError::invalid_metadata(VERSION_KEY, "must be a positive integer")
                })
            })
            .transpose()?;

        self.read_secret(&request.name, version).await
    }

    async fn bulk_get_secret(&self, _request: &BulkSecretRequest) -> Result<BulkSecretResponse> {
        let Connection { client, config } = self.connection()?;

        let keys = match kv2::list(client, &config.engine_path, config.list_path()).await {
            Ok(keys) => keys,
            Err(ClientError::APIError { code: 404, .. }) => Vec::new(),
            Err(e) => return Err(SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e)),
        };

        let mut secrets = BulkSecretResponse::new();
        // Trailing '/' marks a sub-folder, not a secret
        for key in keys.into_iter().filter(|k| !k.ends_with('/')) {
            match self.read_secret(&key, None).await {
                Ok(secret) => {
                    secrets.insert(key, secret);
                }
                // Deleted between list and read
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(secrets)
    }

    fn features(&self) -> Vec<Feature> {
        vec![Feature::BulkGet, Feature::MultipleKeyValuesPerSecret]
    }

    fn backend_type(&self) -> &'static str {
        BACKEND_TYPE
    }
}

fn render_fields(data: HashMap<String, Value>) -> SecretResponse {
    data.into_iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key, s),
            other => (key, other.to_string()),
        })
        .collect()
}
