//! Store instance manager
//!
//! Owns one initialized store per configured name. Instances are built
//! lazily on first use (or eagerly through [`StoreInstanceManager::initialize_all`]):
//!
//! 1. a ready instance is returned as-is;
//! 2. otherwise the first caller constructs a fresh store from the
//!    [`BackendRegistry`] and spawns its `init` on the runtime, recording the
//!    attempt in the slot map;
//! 3. every concurrent caller for the same name awaits that one shared
//!    attempt and observes the same outcome;
//! 4. a failed attempt is removed so the next call retries from scratch;
//! 5. a successful attempt is cached for the process lifetime or until
//!    [`StoreInstanceManager::teardown`].
//!
//! The slot map lock is only held for the check-or-insert step. `init` runs on
//! its own task, which also records the outcome in the slot map. Cancelling a
//! waiting request therefore never aborts an initialization other callers
//! depend on, and never leaves a finished attempt parked in the map. Distinct
//! names never contend.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::{debug, info, warn, Instrument};
use validator::Validate;

use super::component::{ComponentDescriptor, SecretScope};
use super::contract::SecretStore;
use super::metadata::ComponentMetadata;
use super::registry::BackendRegistry;
use crate::errors::{Result, SecretStoreError};

/// Default bound on a single store initialization
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_secs(30);

type InitOutcome = Result<Arc<dyn SecretStore>>;
type SharedInit = Shared<BoxFuture<'static, InitOutcome>>;
type SlotMap = Arc<DashMap<String, Slot>>;

enum Slot {
    Ready(Arc<dyn SecretStore>),
    Initializing { attempt: u64, outcome: SharedInit },
}

impl Slot {
    fn is_attempt(&self, id: u64) -> bool {
        matches!(self, Slot::Initializing { attempt, .. } if *attempt == id)
    }
}

/// Holds one named store instance per configured component
pub struct StoreInstanceManager {
    registry: Arc<BackendRegistry>,
    descriptors: DashMap<String, ComponentDescriptor>,
    slots: SlotMap,
    next_attempt: AtomicU64,
    init_timeout: Duration,
}

impl std::fmt::Debug for StoreInstanceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreInstanceManager")
            .field("registry", &self.registry)
            .field("stores", &self.store_names())
            .field("init_timeout", &self.init_timeout)
            .finish()
    }
}

impl StoreInstanceManager {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self::with_init_timeout(registry, DEFAULT_INIT_TIMEOUT)
    }

    pub fn with_init_timeout(registry: Arc<BackendRegistry>, init_timeout: Duration) -> Self {
        Self {
            registry,
            descriptors: DashMap::new(),
            slots: Arc::new(DashMap::new()),
            next_attempt: AtomicU64::new(1),
            init_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Add a named component configuration.
    ///
    /// # Errors
    ///
    /// [`SecretStoreError::Config`] if the descriptor is invalid or the name
    /// is already configured.
    pub fn configure(&self, descriptor: ComponentDescriptor) -> Result<()> {
        descriptor.validate()?;

        match self.descriptors.entry(descriptor.name.clone()) {
            Entry::Occupied(_) => Err(SecretStoreError::config(format!(
                "Secret store '{}' is already configured",
                descriptor.name
            ))),
            Entry::Vacant(entry) => {
                info!(
                    store = %descriptor.name,
                    backend_type = %descriptor.backend_type,
                    "Configured secret store component"
                );
                entry.insert(descriptor);
                Ok(())
            }
        }
    }

    /// Get a copy of a configured descriptor
    pub fn descriptor(&self, name: &str) -> Option<ComponentDescriptor> {
        self.descriptors.get(name).map(|d| d.value().clone())
    }

    /// Get the secret scope of a configured store (unrestricted if unknown)
    pub fn scope(&self, name: &str) -> SecretScope {
        self.descriptors.get(name).map(|d| d.scope.clone()).unwrap_or_default()
    }

    /// Sorted names of every configured store
    pub fn store_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.iter().map(|d| d.key().clone()).collect();
        names.sort();
        names
    }

    /// Check whether a store has a ready, initialized instance
    pub fn is_initialized(&self, name: &str) -> bool {
        matches!(self.slots.get(name).as_deref(), Some(Slot::Ready(_)))
    }

    /// Get a ready instance without triggering initialization
    pub fn instance(&self, name: &str) -> Option<Arc<dyn SecretStore>> {
        match self.slots.get(name).as_deref() {
            Some(Slot::Ready(store)) => Some(Arc::clone(store)),
            _ => None,
        }
    }

    /// Resolve a configured store by name, initializing it on first use.
    ///
    /// # Errors
    ///
    /// - [`SecretStoreError::NotConfigured`] if no descriptor has this name
    /// - every error of [`StoreInstanceManager::get_or_init`]
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn SecretStore>> {
        let descriptor = self
            .descriptor(name)
            .ok_or_else(|| SecretStoreError::not_configured(name))?;
        self.get_or_init(&descriptor).await
    }

    /// Resolve or lazily construct the instance for a descriptor.
    ///
    /// # Errors
    ///
    /// - [`SecretStoreError::NotRegistered`] if the backend type is unknown
    /// - [`SecretStoreError::Timeout`] if `init` exceeds the init timeout
    /// - any error returned by the backend's `init`
    pub async fn get_or_init(
        &self,
        descriptor: &ComponentDescriptor,
    ) -> Result<Arc<dyn SecretStore>> {
        let name = descriptor.name.as_str();
        let mut pending = None;

        let (attempt, outcome) = match self.slots.entry(name.to_string()) {
            Entry::Occupied(entry) => match entry.get() {
                Slot::Ready(store) => return Ok(Arc::clone(store)),
                Slot::Initializing { attempt, outcome } => {
                    debug!(store = %name, attempt, "Waiting on in-flight secret store initialization");
                    (*attempt, outcome.clone())
                }
            },
            Entry::Vacant(entry) => {
                let store = self.registry.create(&descriptor.backend_type)?;
                let attempt = self.next_attempt.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel();
                let outcome = async move {
                    rx.await.unwrap_or_else(|_| {
                        Err(SecretStoreError::backend_failure(
                            "secretplane",
                            "initialization task ended without an outcome",
                        ))
                    })
                }
                .boxed()
                .shared();
                entry.insert(Slot::Initializing { attempt, outcome: outcome.clone() });
                pending = Some((store, tx));
                (attempt, outcome)
            }
        };

        // The shard lock is released here, so the task may settle the slot
        if let Some((store, tx)) = pending {
            spawn_init(
                Arc::clone(&self.slots),
                name.to_string(),
                attempt,
                store,
                descriptor.metadata.clone(),
                self.init_timeout,
                tx,
            );
        }

        let result = outcome.await;
        settle(&self.slots, name, attempt, &result);
        result
    }

    /// Initialize every configured store concurrently.
    ///
    /// Returns one `(name, outcome)` pair per store, sorted by name.
    pub async fn initialize_all(&self) -> Vec<(String, Result<()>)> {
        let names = self.store_names();
        let attempts = names.iter().map(|name| async move {
            let outcome = self.resolve(name).await.map(|_| ());
            (name.clone(), outcome)
        });
        futures::future::join_all(attempts).await
    }

    /// Remove a store instance and release its backend connection.
    ///
    /// The component stays configured; the next request builds a fresh
    /// instance. An in-flight attempt is dropped from the map and whatever it
    /// produces is closed. Returns `true` if a ready instance was closed.
    pub async fn teardown(&self, name: &str) -> Result<bool> {
        match self.slots.remove(name) {
            Some((_, Slot::Ready(store))) => {
                info!(store = %name, backend_type = store.backend_type(), "Closing secret store");
                store.close().await?;
                Ok(true)
            }
            Some((_, Slot::Initializing { attempt, outcome })) => {
                debug!(store = %name, attempt, "Discarded in-flight secret store initialization");
                let name = name.to_string();
                tokio::spawn(async move {
                    if let Ok(store) = outcome.await {
                        if let Err(e) = store.close().await {
                            warn!(store = %name, error = %e, "Failed to close discarded secret store");
                        }
                    }
                });
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Tear down every instance. Close failures are logged and skipped.
    pub async fn shutdown(&self) {
        let names: Vec<String> = self.slots.iter().map(|s| s.key().clone()).collect();
        for name in names {
            if let Err(e) = self.teardown(&name).await {
                warn!(store = %name, error = %e, "Failed to close secret store");
            }
        }
    }
}

/// Record the outcome of an attempt if it is still the current one.
fn settle(slots: &DashMap<String, Slot>, name: &str, attempt: u64, result: &InitOutcome) {
    match result {
        Ok(store) => {
            if let Some(mut slot) = slots.get_mut(name) {
                if slot.is_attempt(attempt) {
                    *slot = Slot::Ready(Arc::clone(store));
                }
            }
        }
        Err(_) => {
            slots.remove_if(name, |_, slot| slot.is_attempt(attempt));
        }
    }
}

fn spawn_init(
    slots: SlotMap,
    name: String,
    attempt: u64,
    mut store: Box<dyn SecretStore>,
    metadata: ComponentMetadata,
    init_timeout: Duration,
    tx: oneshot::Sender<InitOutcome>,
) {
    let span = crate::init_span!(name, store.backend_type());
    let init = async move {
        let backend_type = store.backend_type();
        debug!("Initializing secret store");

        let result = match tokio::time::timeout(init_timeout, store.init(&metadata)).await {
            Ok(Ok(())) => {
                info!(store = %name, backend_type, "Secret store initialized");
                let store: Arc<dyn SecretStore> = Arc::from(store);
                Ok(store)
            }
            Ok(Err(e)) => {
                warn!(store = %name, backend_type, error = %e, "Secret store initialization failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    store = %name,
                    backend_type,
                    timeout_ms = init_timeout.as_millis() as u64,
                    "Secret store initialization timed out"
                );
                Err(SecretStoreError::timeout(
                    format!("init of store '{}'", name),
                    init_timeout.as_millis() as u64,
                ))
            }
        };

        settle(&slots, &name, attempt, &result);
        // Nobody may be waiting any more
        let _ = tx.send(result);
    };
    tokio::spawn(init.instrument(span));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    fn manager() -> StoreInstanceManager {
        StoreInstanceManager::new(Arc::new(BackendRegistry::with_builtin_backends()))
    }

    #[test]
    fn test_configure_rejects_duplicates() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("env", "local.env")).unwrap();

        let err = manager.configure(ComponentDescriptor::new("env", "local.file")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(manager.store_names(), vec!["env".to_string()]);
    }

    #[test]
    fn test_configure_validates_descriptor() {
        let manager = manager();
        let err = manager.configure(ComponentDescriptor::new("env", "")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_resolve_unknown_store() {
        let manager = manager();
        let err = manager.resolve("missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConfigured);
    }

    #[tokio::test]
    async fn test_resolve_unregistered_backend_leaves_no_slot() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("kv", "azure.keyvault")).unwrap();

        let err = manager.resolve("kv").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotRegistered);
        assert!(!manager.is_initialized("kv"));
        assert!(manager.slots.get("kv").is_none());
    }

    #[tokio::test]
    async fn test_resolve_caches_instance() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("env", "local.env")).unwrap();

        let first = manager.resolve("env").await.unwrap();
        let second = manager.resolve("env").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(manager.is_initialized("env"));
    }

    #[tokio::test]
    async fn test_failed_init_is_not_cached() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("file", "local.file")).unwrap();

        let err = manager.resolve("file").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidMetadata);
        assert!(!manager.is_initialized("file"));
        assert!(manager.slots.get("file").is_none());
    }

    #[tokio::test]
    async fn test_teardown_allows_rebuild() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("env", "local.env")).unwrap();

        let first = manager.resolve("env").await.unwrap();
        assert!(manager.teardown("env").await.unwrap());
        assert!(!manager.is_initialized("env"));
        assert!(!manager.teardown("env").await.unwrap());

        let second = manager.resolve("env").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_initialize_all_reports_each_store() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("env", "local.env")).unwrap();
        manager.configure(ComponentDescriptor::new("file", "local.file")).unwrap();

        let results = manager.initialize_all().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "env");
        assert!(results[0].1.is_ok());
        assert_eq!(results[1].0, "file");
        assert!(results[1].1.is_err());
    }

    #[tokio::test]
    async fn test_shutdown_clears_instances() {
        let manager = manager();
        manager.configure(ComponentDescriptor::new("env", "local.env")).unwrap();
        manager.resolve("env").await.unwrap();

        manager.shutdown().await;
        assert!(!manager.is_initialized("env"));
        assert!(manager.instance("env").is_none());
    }
}
