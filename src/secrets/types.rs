//! Request and response types shared by every secret store.
//!
//! Secret values travel inside [`SecretResponse`], which redacts them in
//! `Debug` output and zeroes them when dropped. Values can only be read
//! through explicit accessors.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

/// An optional capability a backend may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// The backend can enumerate every secret in one call
    BulkGet,
    /// One secret may decompose into several named fields
    MultipleKeyValuesPerSecret,
}

impl Feature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BulkGet => "bulk_get",
            Self::MultipleKeyValuesPerSecret => "multiple_key_values_per_secret",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request for a single secret.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretRequest {
    /// Name of the secret in the backend
    pub name: String,
    /// Per-request overrides (e.g. `namespace`, `version_id`)
    pub metadata: HashMap<String, String>,
    /// Deadline for the backend call; the router default applies when unset
    pub timeout: Option<Duration>,
}

impl SecretRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Add one per-request metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Replace the per-request metadata map.
    pub fn with_metadata_map(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a per-request metadata value, treating blank values as absent.
    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// A request for every secret a backend can enumerate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkSecretRequest {
    pub metadata: HashMap<String, String>,
    pub timeout: Option<Duration>,
}

impl BulkSecretRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata_map(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

/// The fields of one secret.
///
/// An empty response means "found but empty"; a missing secret is reported
/// as an error instead.
///
/// # Security
///
/// - Debug output lists field names only, never values
/// - Values are zeroed in memory when the response is dropped
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SecretResponse {
    data: HashMap<String, String>,
}

impl SecretResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Exposes a single field value. Never log the result.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Exposes every field. Never log the result.
    pub fn data(&self) -> &HashMap<String, String> {
        &self.data
    }

    /// Consumes the response and returns the raw field map.
    pub fn into_data(mut self) -> HashMap<String, String> {
        std::mem::take(&mut self.data)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<HashMap<String, String>> for SecretResponse {
    fn from(data: HashMap<String, String>) -> Self {
        Self { data }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SecretResponse {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { data: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl fmt::Debug for SecretResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("SecretResponse").field("keys", &keys).finish()
    }
}

impl Drop for SecretResponse {
    fn drop(&mut self) {
        for value in self.data.values_mut() {
            value.zeroize();
        }
    }
}

/// Every secret a backend enumerated, keyed by secret name.
pub type BulkSecretResponse = HashMap<String, SecretResponse>;
