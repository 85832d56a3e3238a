//! Common test utilities for all integration tests.
//!
//! Provides an instrumented in-memory backend whose behaviour (slow init,
//! failing init, missing features, refusing I/O) is set per test, plus helpers
//! wiring it into a manager and router.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secretplane::secrets::{
    BackendRegistry, BulkSecretRequest, BulkSecretResponse, ComponentDescriptor, ComponentMetadata,
    Feature, SecretRequest, SecretRequestRouter, SecretResponse, SecretStore, StoreInstanceManager,
};
use secretplane::{Result, SecretStoreError};
use tokio::sync::Barrier;

pub const FAKE_BACKEND: &str = "fake";

/// Counters shared by every instance a factory produces
#[derive(Debug, Default)]
pub struct Probe {
    pub inits: AtomicUsize,
    pub reads: AtomicUsize,
    pub bulk_reads: AtomicUsize,
    pub closes: AtomicUsize,
}

impl Probe {
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn bulk_reads(&self) -> usize {
        self.bulk_reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Behaviour of the fake backend
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    pub probe: Arc<Probe>,
    pub secrets: BTreeMap<String, BTreeMap<String, String>>,
    pub init_delay: Duration,
    /// Number of upcoming `init` calls that fail
    pub init_failures: Arc<AtomicUsize>,
    /// Every `init` waits here before completing
    pub init_barrier: Option<Arc<Barrier>>,
    pub read_delay: Duration,
    pub bulk: bool,
    /// Panic if a read reaches the backend
    pub forbid_io: bool,
    pub required_request_metadata: &'static [&'static str],
}

impl FakeBackend {
    pub fn new() -> Self {
        Self { bulk: true, ..Self::default() }
    }

    pub fn with_secret(mut self, name: &str, fields: &[(&str, &str)]) -> Self {
        let fields = fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.secrets.insert(name.to_string(), fields);
        self
    }

    pub fn with_init_delay(mut self, delay: Duration) -> Self {
        self.init_delay = delay;
        self
    }

    pub fn with_init_failures(self, count: usize) -> Self {
        self.init_failures.store(count, Ordering::SeqCst);
        self
    }

    pub fn with_init_barrier(mut self, barrier: Arc<Barrier>) -> Self {
        self.init_barrier = Some(barrier);
        self
    }

    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    pub fn without_bulk(mut self) -> Self {
        self.bulk = false;
        self
    }

    pub fn forbidding_io(mut self) -> Self {
        self.forbid_io = true;
        self
    }

    pub fn requiring(mut self, keys: &'static [&'static str]) -> Self {
        self.required_request_metadata = keys;
        self
    }

    pub fn store(&self) -> FakeStore {
        FakeStore { backend: self.clone(), initialized: false }
    }

    /// A registry with every built-in backend plus this one as `fake`
    pub fn registry(&self) -> BackendRegistry {
        let backend = self.clone();
        let mut registry = BackendRegistry::with_builtin_backends();
        registry.register(FAKE_BACKEND, move || Box::new(backend.store()));
        registry
    }
}

#[derive(Debug)]
pub struct FakeStore {
    backend: FakeBackend,
    initialized: bool,
}

impl FakeStore {
    fn touch_backend(&self) {
        assert!(
            !self.backend.forbid_io,
            "backend I/O attempted on a request that should have been rejected"
        );
    }
}

#[async_trait]
impl SecretStore for FakeStore {
    async fn init(&mut self, _metadata: &ComponentMetadata) -> Result<()> {
        self.backend.probe.inits.fetch_add(1, Ordering::SeqCst);

        if let Some(barrier) = &self.backend.init_barrier {
            barrier.wait().await;
        }
        tokio::time::sleep(self.backend.init_delay).await;

        let failed = self
            .backend
            .init_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(SecretStoreError::backend_failure(FAKE_BACKEND, "connection refused"));
        }

        self.initialized = true;
        Ok(())
    }

    async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse> {
        if !self.initialized {
            return Err(SecretStoreError::not_initialized(FAKE_BACKEND));
        }
        self.touch_backend();
        self.backend.probe.reads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.backend.read_delay).await;

        self.backend
            .secrets
            .get(&request.name)
            .map(|fields| fields.iter().collect())
            .ok_or_else(|| SecretStoreError::not_found(&request.name))
    }

    async fn bulk_get_secret(&self, _request: &BulkSecretRequest) -> Result<BulkSecretResponse> {
        if !self.initialized {
            return Err(SecretStoreError::not_initialized(FAKE_BACKEND));
        }
        self.touch_backend();
        self.backend.probe.bulk_reads.fetch_add(1, Ordering::SeqCst);

        Ok(self
            .backend
            .secrets
            .iter()
            .map(|(name, fields)| (name.clone(), fields.iter().collect()))
            .collect())
    }

    fn features(&self) -> Vec<Feature> {
        if self.backend.bulk {
            vec![Feature::BulkGet, Feature::MultipleKeyValuesPerSecret]
        } else {
            vec![Feature::MultipleKeyValuesPerSecret]
        }
    }

    fn required_request_metadata(&self) -> &'static [&'static str] {
        self.backend.required_request_metadata
    }

    fn backend_type(&self) -> &'static str {
        FAKE_BACKEND
    }

    async fn close(&self) -> Result<()> {
        self.backend.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Manager with one `fake` component per name
pub fn fake_manager(backend: &FakeBackend, names: &[&str]) -> Arc<StoreInstanceManager> {
    let manager = StoreInstanceManager::new(Arc::new(backend.registry()));
    for name in names {
        manager
            .configure(ComponentDescriptor::new(*name, FAKE_BACKEND))
            .expect("configure fake component");
    }
    Arc::new(manager)
}

pub fn fake_router(backend: &FakeBackend, names: &[&str]) -> SecretRequestRouter {
    SecretRequestRouter::new(fake_manager(backend, names))
}

/// Owned copy of a response's fields for equality assertions
pub fn fields(response: &SecretResponse) -> HashMap<String, String> {
    response.data().clone()
}

pub fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}
