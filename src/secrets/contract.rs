//! The store contract every secret backend implements.

use async_trait::async_trait;

use super::metadata::ComponentMetadata;
use super::types::{BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse};
use crate::errors::{Result, SecretStoreError};

/// Trait for secret store backends.
///
/// A store is constructed uninitialized by its registry factory, initialized
/// exactly once through [`SecretStore::init`] while still exclusively owned,
/// and only then shared behind an `Arc`. Every other method must be safe to
/// call concurrently.
///
/// # Security Considerations
///
/// - Implementations MUST NOT log secret values
/// - Backend clients and their errors MUST NOT leak through the contract;
///   wrap them with [`SecretStoreError::backend_failure_with_source`]
///
/// # Example Implementation
///
/// ```rust,ignore
/// use secretplane::secrets::{ComponentMetadata, SecretRequest, SecretResponse, SecretStore};
/// use secretplane::Result;
/// use async_trait::async_trait;
///
/// #[derive(Debug, Default)]
/// struct StaticStore {
///     token: Option<String>,
/// }
///
/// #[async_trait]
/// impl SecretStore for StaticStore {
///     async fn init(&mut self, metadata: &ComponentMetadata) -> Result<()> {
///         self.token = Some(metadata.require("token")?.to_string());
///         Ok(())
///     }
///
///     async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse> {
///         let token = self.token.as_deref().ok_or_else(|| SecretStoreError::not_initialized("static"))?;
///         Ok(SecretResponse::new().with_field(request.name.clone(), token))
///     }
///
///     fn backend_type(&self) -> &'static str {
///         "static"
///     }
/// }
/// ```
#[async_trait]
pub trait SecretStore: Send + Sync + std::fmt::Debug {
    /// Validate and consume component metadata, establishing any backend
    /// connection.
    ///
    /// # Errors
    ///
    /// - [`SecretStoreError::InvalidMetadata`] if a required key is missing
    /// - [`SecretStoreError::BackendFailure`] if the connection cannot be set up
    async fn init(&mut self, metadata: &ComponentMetadata) -> Result<()>;

    /// Fetch one secret.
    ///
    /// # Errors
    ///
    /// - [`SecretStoreError::NotInitialized`] before a successful `init`
    /// - [`SecretStoreError::NotFound`] if the secret doesn't exist
    /// - [`SecretStoreError::BackendFailure`] if the backend call fails
    async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse>;

    /// Fetch every secret the backend can enumerate.
    ///
    /// Backends that do not declare [`Feature::BulkGet`] keep this default.
    async fn bulk_get_secret(&self, _request: &BulkSecretRequest) -> Result<BulkSecretResponse> {
        Err(SecretStoreError::unsupported("bulk_get_secret", self.backend_type()))
    }

    /// Optional capabilities this backend supports.
    fn features(&self) -> Vec<Feature> {
        Vec::new()
    }

    /// Per-request metadata keys that must be present and non-empty.
    ///
    /// The router checks these before invoking the backend, so a malformed
    /// request never reaches backend I/O.
    fn required_request_metadata(&self) -> &'static [&'static str] {
        &[]
    }

    /// The registered type name of this backend
    fn backend_type(&self) -> &'static str;

    /// Release the backend connection. Called on explicit teardown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }

    /// Check whether a feature is declared.
    fn has_feature(&self, feature: Feature) -> bool {
        self.features().contains(&feature)
    }
}
