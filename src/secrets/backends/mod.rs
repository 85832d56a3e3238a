//! Reference secret store backends
//!
//! - **local.file**: JSON document on disk (development)
//! - **local.env**: process environment (development)
//! - **kubernetes**: `v1/Secret` objects (feature `kubernetes`)
//! - **hashicorp.vault**: Vault KV v2 engine (feature `vault`)

pub mod local_env;
pub mod local_file;

#[cfg(feature = "kubernetes")]
pub mod kubernetes;

#[cfg(feature = "vault")]
pub mod vault;

pub use local_env::LocalEnvSecretStore;
pub use local_file::LocalFileSecretStore;

#[cfg(feature = "kubernetes")]
pub use kubernetes::KubernetesSecretStore;

#[cfg(feature = "vault")]
pub use vault::VaultSecretStore;
