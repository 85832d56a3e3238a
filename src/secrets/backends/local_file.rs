//! JSON file secret store.
//!
//! Reads secrets from a local JSON document. Nested objects and arrays are
//! flattened into single keys joined by `nestedSeparator`; array elements are
//! addressed by index. The file is re-read on every call, so edits are picked
//! up without a restart.
//!
//! ```json
//! { "db": { "user": "app", "password": "hunter2" }, "hosts": ["a", "b"] }
//! ```
//!
//! flattens to `db:user`, `db:password`, `hosts:0`, `hosts:1`. With
//! `multiValued: true` the top-level keys are the secrets instead, and `db`
//! returns `{"user": "app", "password": "hunter2"}`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use crate::errors::{Result, SecretStoreError};
use crate::secrets::contract::SecretStore;
use crate::secrets::metadata::ComponentMetadata;
use crate::secrets::types::{
    BulkSecretRequest, BulkSecretResponse, Feature, SecretRequest, SecretResponse,
};

const BACKEND_TYPE: &str = "local.file";
const DEFAULT_NESTED_SEPARATOR: &str = ":";

#[derive(Debug, Clone)]
struct FileSettings {
    path: PathBuf,
    separator: String,
    multi_valued: bool,
}

/// Local JSON file secret store (development only)
#[derive(Debug, Clone, Default)]
pub struct LocalFileSecretStore {
    settings: Option<FileSettings>,
}

impl LocalFileSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn settings(&self) -> Result<&FileSettings> {
        self.settings.as_ref().ok_or_else(|| SecretStoreError::not_initialized(BACKEND_TYPE))
    }

    async fn load(path: &Path) -> Result<Value> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))?;

        let document: Value = serde_json::from_str(&raw)
            .map_err(|e| SecretStoreError::backend_failure_with_source(BACKEND_TYPE, e))?;

        if !document.is_object() {
            return Err(SecretStoreError::backend_failure(
                BACKEND_TYPE,
                format!("{} must contain a JSON object", path.display()),
            ));
        }
        Ok(document)
    }

    /// Build the secret map the current file describes
    async fn read_secrets(&self) -> Result<BTreeMap<String, SecretResponse>> {
        let settings = self.settings()?;
        let document = Self::load(&settings.path).await?;

        let mut secrets = BTreeMap::new();
        let Value::Object(entries) = document else {
            return Ok(secrets);
        };

        for (key, value) in entries {
            if settings.multi_valued {
                let fields = match &value {
                    Value::Object(_) | Value::Array(_) => flatten(&value, &settings.separator),
                    scalar => BTreeMap::from([(key.clone(), render_scalar(scalar))]),
                };
                secrets.insert(key, fields.into_iter().collect());
            } else {
                for (flat_key, flat_value) in flatten_with_prefix(&key, &value, &settings.separator)
                {
                    let response = SecretResponse::new().with_field(flat_key.clone(), flat_value);
                    secrets.insert(flat_key, response);
                }
            }
        }

        Ok(secrets)
    }
}

#[async_trait]
impl SecretStore for LocalFileSecretStore {
    async fn init(&mut self, metadata: &ComponentMetadata) -> Result<()> {
        let path = PathBuf::from(metadata.require("secretsFile")?);
        let separator = metadata.get_or("nestedSeparator", DEFAULT_NESTED_SEPARATOR).to_string();
        let multi_valued = metadata.get_bool("multiValued", false)?;

        // Fail init on an unreadable file instead of on the first request
        Self::load(&path).await?;

        info!(path = %path.display(), multi_valued, "Initialized local file secret store");
        self.settings = Some(FileSettings { path, separator, multi_valued });
        Ok(())
    }

    async fn get_secret(&self, request: &SecretRequest) -> Result<SecretResponse> {
        let mut secrets = self.read_secrets().await?;
        debug!(secret = %request.name, "Reading secret from local file");
        secrets.remove(&request.name).ok_or_else(|| SecretStoreError::not_found(&request.name))
    }

    async fn bulk_get_secret(&self, _request: &BulkSecretRequest) -> Result<BulkSecretResponse> {
        Ok(self.read_secrets().await?.into_iter().collect())
    }

    fn features(&self) -> Vec<Feature> {
        match &self.settings {
            Some(settings) if settings.multi_valued => {
                vec![Feature::BulkGet, Feature::MultipleKeyValuesPerSecret]
            }
            _ => vec![Feature::BulkGet],
        }
    }

    fn backend_type(&self) -> &'static str {
        BACKEND_TYPE
    }
}

/// Flatten the children of `value` into `key -> string` pairs.
fn flatten(value: &Value, separator: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                out.extend(flatten_with_prefix(key, child, separator));
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                out.extend(flatten_with_prefix(&index.to_string(), child, separator));
            }
        }
        scalar => {
            out.insert(String::new(), render_scalar(scalar));
        }
    }
    out
}

fn flatten_with_prefix(prefix: &str, value: &Value, separator: &str) -> BTreeMap<String, String> {
    match value {
        Value::Object(_) | Value::Array(_) => flatten(value, separator)
            .into_iter()
            .map(|(key, v)| (format!("{}{}{}", prefix, separator, key), v))
            .collect(),
        scalar => BTreeMap::from([(prefix.to_string(), render_scalar(scalar))]),
    }
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
