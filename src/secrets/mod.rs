//! Pluggable secret stores behind one contract.
//!
//! # Architecture
//!
//! - [`SecretStore`]: the contract every backend implements (`init`,
//!   `get_secret`, optional `bulk_get_secret`, declared [`Feature`]s)
//! - [`BackendRegistry`]: backend type name → constructor of a fresh store
//! - [`StoreInstanceManager`]: one lazily initialized instance per configured
//!   component name; concurrent first use triggers exactly one `init`
//! - [`SecretRequestRouter`]: validates a request, resolves the instance and
//!   invokes the backend under a deadline
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use secretplane::secrets::{
//!     BackendRegistry, ComponentDescriptor, SecretRequest, SecretRequestRouter,
//!     StoreInstanceManager,
//! };
//!
//! let manager = StoreInstanceManager::new(Arc::new(BackendRegistry::with_builtin_backends()));
//! manager.configure(
//!     ComponentDescriptor::new("cluster", "kubernetes").with_metadata("defaultNamespace", "prod"),
//! )?;
//!
//! let router = SecretRequestRouter::new(Arc::new(manager));
//! let secret = router.get_secret("cluster", SecretRequest::new("db-credentials")).await?;
//! let password = secret.get("password");
//! ```
//!
//! # Security Considerations
//!
//! - Secret values are never logged; [`SecretResponse`]'s `Debug` prints keys only
//! - Response values are zeroized when dropped
//! - Nothing is cached between requests; every call reads the backend

pub mod backends;
pub mod component;
pub mod contract;
pub mod manager;
pub mod metadata;
pub mod registry;
pub mod router;
pub mod types;

pub use component::{Access, ComponentDescriptor, SecretScope};
pub use contract::SecretStore;
pub use manager::{StoreInstanceManager, DEFAULT_INIT_TIMEOUT};
pub use metadata::ComponentMetadata;
pub use registry::{BackendRegistry, StoreFactory};
pub use router::{SecretRequestRouter, DEFAULT_REQUEST_TIMEOUT};
pub use types::{
    BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse,
};
