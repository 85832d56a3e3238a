//! Kubernetes secret store.
//!
//! Reads `v1/Secret` objects through the cluster API. One secret decomposes
//! into every entry of its `data` map, decoded to strings. Values must be
//! UTF-8: reading a secret with binary data (keystores, DER certificates) is a
//! backend failure naming the offending key, and bulk reads skip such secrets.
//!
//! # Metadata
//!
//! - `defaultNamespace` (optional): namespace used when a request names none
//! - `kubeconfigPath` (optional): kubeconfig file; in-cluster or
//!   `~/.kube/config` discovery otherwise
//!
//! # Request metadata
//!
//! - `namespace`: overrides `defaultNamespace`; required when no default is set

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::{debug, info, warn};

use crate::errors::{Result, SecretStoreError};
use crate::secrets::contract::SecretStore;
use crate::secrets::metadata::ComponentMetadata;
use crate::secrets::types::{
    BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse,
};

const BACKEND_TYPE: &str = "kubernetes";
const NAMESPACE_KEY: &str = "namespace";

/// Kubernetes `v1/Secret` store
#[derive(Clone, Default)]
pub struct KubernetesSecretStore {
    client: Option<Client>,
    default_namespace: Option<String>,
}

impl std::fmt::Debug for KubernetesSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubernetesSecretStore")
            .field("default_namespace", &self.default_namespace)
            .field("client", &self.client.as_ref().map(|_| "[kube::Client]"))
            .finish()
    }
}

impl KubernetesSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already-built client instead of discovering one during `init`
    pub fn with_client(client: Client) -> Self {
        Self { client: Some(client), default_namespace: None }
    }

    async fn build_client(kubeconfig_path: Option<&str>) -> Result<Client> {
        crate::install_rustls_provider();

        let Some(path) = kubeconfig_path else {
            return Client::try_default()
                .await
                .map_err(|e| SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e));
        };

        let kubeconfig = Kubeconfig::read_from(PathBuf::from(path)).map_err(|e| {
            SecretStoreError::invalid_metadata("kubeconfigPath", e.to_string())
        })?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| SecretStoreError::invalid_metadata("kubeconfigPath", e.to_string()))?;

        Client::try_from(config)
            .map_err(|e| SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))
    }

    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or_else(|| SecretStoreError::not_initialized(BACKEND_TYPE))
    }

    fn namespace<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        requested.or(self.default_namespace.as_deref()).ok_or_else(|| {
            SecretStoreError::invalid_metadata(NAMESPACE_KEY, "namespace is missing on metadata")
        })
    }

    fn secrets_api(&self, namespace: &str) -> Result<Api<Secret>> {
        Ok(Api::namespaced(self.client()?.clone(), namespace))
    }
}

#[async_trait]
impl SecretStore for KubernetesSecretStore {
    async fn init(&mut self, metadata: &ComponentMetadata) -> Result<()> {
        self.default_namespace = metadata.get("defaultNamespace").map(str::to_string);

        if self.client.is_none() {
            self.client = Some(Self::build_client(metadata.get("kubeconfigPath")).await?);
        }

        info!(
            default_namespace = ?self.default_namespace,
            "Initialized Kubernetes secret store"
        );
        Ok(())
    }

    async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse> {
        let namespace = self.namespace(request.metadata_value(NAMESPACE_KEY))?;
        let api = self.secrets_api(namespace)?;

        debug!(namespace, secret = %request.name, "Fetching Kubernetes secret");

        match api.get(&request.name).await {
            Ok(secret) => decode_data(&request.name, secret.data),
            Err(kube::Error::Api(e)) if e.code == 404 => {
                Err(SecretStoreError::not_found(&request.name))
            }
            Err(e) => {
                warn!(namespace, secret = %request.name, error = %e, "Kubernetes secret read failed");
                Err(SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))
            }
        }
    }

    async fn bulk_get_secret(&self, request: &BulkSecretRequest) -> Result<BulkSecretResponse> {
        let namespace = self.namespace(request.metadata_value(NAMESPACE_KEY))?;
        let api = self.secrets_api(namespace)?;

        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))?;

        debug!(namespace, count = list.items.len(), "Listed Kubernetes secrets");

        Ok(list
            .items
            .into_iter()
            .filter_map(|secret| {
                let name = secret.metadata.name?;
                match decode_data(&name, secret.data) {
                    Ok(response) => Some((name, response)),
                    Err(e) => {
                        warn!(namespace, secret = %name, error = %e, "Skipping undecodable Kubernetes secret");
                        None
                    }
                }
            })
            .collect())
    }

    fn features(&self) -> Vec<Feature> {
        vec![Feature::BulkGet, Feature::MultipleKeyValuesPerSecret]
    }

    fn required_request_metadata(&self) -> &'static [&'static str] {
        if self.default_namespace.is_some() {
            &[]
        } else {
            &[NAMESPACE_KEY]
        }
    }

    fn backend_type(&self) -> &'static str {
        BACKEND_TYPE
    }
}

fn decode_data(name: &str, data: Option<BTreeMap<String, ByteString>>) -> Result<SecretResponse> {
    data.unwrap_or_default()
        .into_iter()
        .map(|(key, ByteString(bytes))| match String::from_utf8(bytes) {
            Ok(value) => Ok((key, value)),
            Err(_) => Err(SecretStoreError::backend_failure(
                BACKEND_TYPE,
                format!("key '{}' of secret '{}' is not valid UTF-8", key, name),
            )),
        })
        .collect()
}
