//! Component metadata supplied at configuration time.
//!
//! Metadata is an opaque string map; each backend parses the keys it needs
//! inside its own `init` using the typed accessors here, so a missing or
//! malformed key surfaces as [`SecretStoreError::InvalidMetadata`] before any
//! backend I/O happens.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SecretStoreError};

/// Backend-specific configuration for one store instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentMetadata(HashMap<String, String>);

impl ComponentMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a value, treating blank values as absent.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
    }

    /// Get a value or fail with `InvalidMetadata`.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| SecretStoreError::missing_metadata(key))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`).
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => match raw.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(SecretStoreError::invalid_metadata(
                    key,
                    format!("expected a boolean, got '{}'", raw),
                )),
            },
        }
    }

    /// Parse a whole number of seconds.
    pub fn get_duration_secs(&self, key: &str) -> Result<Option<Duration>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.parse::<u64>().map(|secs| Some(Duration::from_secs(secs))).map_err(
                |e| {
                    SecretStoreError::invalid_metadata(
                        key,
                        format!("expected whole seconds, got '{}': {}", raw, e),
                    )
                },
            ),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, String>> for ComponentMetadata {
    fn from(map: HashMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ComponentMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
