//! Secret request router
//!
//! Entry point for callers: resolves the named store through the
//! [`StoreInstanceManager`], rejects requests that can be rejected without
//! touching the backend (scope, unsupported operation, missing per-request
//! metadata), then invokes the backend under a deadline. Every call is a live
//! backend read; nothing is cached between requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn, Instrument};

use super::contract::SecretStore;
use super::manager::StoreInstanceManager;
use super::types::{BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse};
use crate::errors::{Result, SecretStoreError};

/// Default deadline for one backend call
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Routes secret requests to named store instances
#[derive(Debug, Clone)]
pub struct SecretRequestRouter {
    manager: Arc<StoreInstanceManager>,
    default_timeout: Duration,
}

impl SecretRequestRouter {
    pub fn new(manager: Arc<StoreInstanceManager>) -> Self {
        Self::with_default_timeout(manager, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_default_timeout(manager: Arc<StoreInstanceManager>, default_timeout: Duration) -> Self {
        Self { manager, default_timeout }
    }

    pub fn manager(&self) -> &Arc<StoreInstanceManager> {
        &self.manager
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Fetch one secret from a named store.
    ///
    /// # Errors
    ///
    /// - resolution errors from the manager, unchanged
    /// - [`SecretStoreError::PermissionDenied`] if the store's scope refuses the name
    /// - [`SecretStoreError::InvalidMetadata`] if a required per-request key is missing
    /// - [`SecretStoreError::Timeout`] if the backend misses the deadline
    /// - [`SecretStoreError::NotFound`] / [`SecretStoreError::BackendFailure`] from the backend
    pub async fn get_secret(&self, store_name: &str, request: SecretRequest) -> Result<SecretResponse> {
        let span = crate::store_span!(store_name, "get_secret", secret = %request.name);

        async {
            let store = self.manager.resolve(store_name).await?;

            if !self.manager.scope(store_name).is_secret_allowed(&request.name) {
                warn!(secret = %request.name, "Secret access denied by store scope");
                return Err(SecretStoreError::permission_denied(store_name, &request.name));
            }

            validate_request_metadata(store.as_ref(), |key| request.metadata_value(key))?;

            let timeout = request.timeout.unwrap_or(self.default_timeout);
            let response = invoke("get_secret", timeout, store.get_secret(&request))
                .await
                .map_err(|e| e.with_store_context(store_name))?;

            debug!(fields = response.len(), "Fetched secret");
            Ok(response)
        }
        .instrument(span)
        .await
    }

    /// Fetch every secret a named store can enumerate.
    ///
    /// Secrets the store's scope refuses are filtered out of the result.
    ///
    /// # Errors
    ///
    /// Same as [`SecretRequestRouter::get_secret`], plus
    /// [`SecretStoreError::Unsupported`] if the backend does not declare
    /// [`Feature::BulkGet`]; the backend is not invoked in that case.
    pub async fn bulk_get_secret(
        &self,
        store_name: &str,
        request: BulkSecretRequest,
    ) -> Result<BulkSecretResponse> {
        let span = crate::store_span!(store_name, "bulk_get_secret");

        async {
            let store = self.manager.resolve(store_name).await?;

            if !store.has_feature(Feature::BulkGet) {
                return Err(SecretStoreError::unsupported("bulk_get_secret", store.backend_type()));
            }

            validate_request_metadata(store.as_ref(), |key| request.metadata_value(key))?;

            let timeout = request.timeout.unwrap_or(self.default_timeout);
            let mut secrets = invoke("bulk_get_secret", timeout, store.bulk_get_secret(&request))
                .await
                .map_err(|e| e.with_store_context(store_name))?;

            let scope = self.manager.scope(store_name);
            if !scope.is_unrestricted() {
                secrets.retain(|name, _| scope.is_secret_allowed(name));
            }

            debug!(secrets = secrets.len(), "Fetched secrets in bulk");
            Ok(secrets)
        }
        .instrument(span)
        .await
    }
}

fn validate_request_metadata<'a, F>(store: &dyn SecretStore, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<&'a str>,
{
    for &key in store.required_request_metadata() {
        if lookup(key).is_none() {
            return Err(SecretStoreError::invalid_metadata(
                key,
                format!(
                    "missing required metadata key for backend '{}'",
                    store.backend_type()
                ),
            ));
        }
    }
    Ok(())
}

async fn invoke<T, F>(operation: &str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "Secret store call timed out");
            Err(SecretStoreError::timeout(operation, timeout.as_millis() as u64))
        }
    }
}
