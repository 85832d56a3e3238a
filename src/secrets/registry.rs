//! Backend registry
//!
//! Maps a backend type name to a factory producing a fresh, uninitialized
//! [`SecretStore`]. The registry is populated at startup through `&mut self`
//! and then shared read-only behind an `Arc`, so lookups never race with
//! registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::backends::{LocalEnvSecretStore, LocalFileSecretStore};
use super::contract::SecretStore;
use crate::errors::{Result, SecretStoreError};

/// Prefix accepted (and ignored) in front of backend type names
const TYPE_PREFIX: &str = "secretstores.";

/// Factory producing a fresh, uninitialized store
pub type StoreFactory = Arc<dyn Fn() -> Box<dyn SecretStore> + Send + Sync>;

/// Registry of secret store constructors keyed by backend type
#[derive(Clone, Default)]
pub struct BackendRegistry {
    factories: BTreeMap<String, StoreFactory>,
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl BackendRegistry {
    /// Create a new registry with no backends
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every reference backend compiled into this build
    pub fn with_builtin_backends() -> Self {
        let mut registry = Self::new();

        registry.register("local.file", || Box::new(LocalFileSecretStore::new()));
        registry.register("local.env", || Box::new(LocalEnvSecretStore::new()));

        #[cfg(feature = "kubernetes")]
        {
            use super::backends::KubernetesSecretStore;
            registry.register("kubernetes", || Box::new(KubernetesSecretStore::new()));
        }

        #[cfg(feature = "vault")]
        {
            use super::backends::VaultSecretStore;
            registry.register("hashicorp.vault", || Box::new(VaultSecretStore::new()));
            registry.register("vault", || Box::new(VaultSecretStore::new()));
        }

        registry
    }

    /// Normalize a type name: lowercase, `secretstores.` prefix stripped
    pub fn normalize_type(backend_type: &str) -> String {
        let lowered = backend_type.trim().to_ascii_lowercase();
        match lowered.strip_prefix(TYPE_PREFIX) {
            Some(stripped) => stripped.to_string(),
            None => lowered,
        }
    }

    /// Register a backend constructor
    pub fn register<F>(&mut self, backend_type: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn SecretStore> + Send + Sync + 'static,
    {
        let key = Self::normalize_type(backend_type);
        if self.factories.contains_key(&key) {
            warn!(backend_type = %key, "Replacing previously registered secret store backend");
        } else {
            info!(backend_type = %key, "Registering secret store backend");
        }
        self.factories.insert(key, Arc::new(factory));
        self
    }

    /// Check if a backend type is registered
    pub fn is_registered(&self, backend_type: &str) -> bool {
        self.factories.contains_key(&Self::normalize_type(backend_type))
    }

    /// Get the sorted list of registered backend types
    pub fn registered_types(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Construct a fresh, uninitialized store of the given type
    pub fn create(&self, backend_type: &str) -> Result<Box<dyn SecretStore>> {
        let factory = self
            .factories
            .get(&Self::normalize_type(backend_type))
            .ok_or_else(|| SecretStoreError::not_registered(backend_type))?;
        Ok(factory())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use tracing_test::traced_test;

    #[test]
    fn test_registry_creation() {
        let registry = BackendRegistry::new();
        assert!(registry.registered_types().is_empty());
        assert!(!registry.is_registered("local.env"));
    }

    #[test]
    fn test_builtin_backends() {
        let registry = BackendRegistry::with_builtin_backends();
        assert!(registry.is_registered("local.file"));
        assert!(registry.is_registered("local.env"));
        #[cfg(feature = "kubernetes")]
        assert!(registry.is_registered("kubernetes"));
        #[cfg(feature = "vault")]
        {
            assert!(registry.is_registered("hashicorp.vault"));
            assert!(registry.is_registered("vault"));
        }
    }

    #[test]
    fn test_type_normalization() {
        assert_eq!(BackendRegistry::normalize_type("secretstores.Local.File"), "local.file");
        assert_eq!(BackendRegistry::normalize_type(" kubernetes "), "kubernetes");

        let registry = BackendRegistry::with_builtin_backends();
        let store = registry.create("SecretStores.local.env").unwrap();
        assert_eq!(store.backend_type(), "local.env");
    }

    #[test]
    fn test_unknown_type_is_not_registered() {
        let registry = BackendRegistry::with_builtin_backends();
        let err = registry.create("azure.keyvault").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotRegistered);
        assert!(err.to_string().contains("azure.keyvault"));
    }

    #[test]
    fn test_registry_debug_lists_types() {
        let registry = BackendRegistry::with_builtin_backends();
        let debug_output = format!("{:?}", registry);
        assert!(debug_output.contains("local.file"));
    }

    #[traced_test]
    #[test]
    fn test_duplicate_registration_replaces_with_warning() {
        let mut registry = BackendRegistry::with_builtin_backends();
        registry.register("local.env", || Box::new(LocalFileSecretStore::new()));

        assert!(logs_contain("Replacing previously registered secret store backend"));
        let store = registry.create("local.env").unwrap();
        assert_eq!(store.backend_type(), "local.file");
    }
}
