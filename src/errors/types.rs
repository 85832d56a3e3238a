//! # Error Types
//!
//! The uniform error surface for every secret-store operation, built with
//! `thiserror`. Backend-specific error types never cross this boundary: they
//! are folded into [`SecretStoreError::BackendFailure`] with the original
//! cause kept as a shared source for diagnostics.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Custom result type for secret-store operations
pub type Result<T> = std::result::Result<T, SecretStoreError>;

/// Shared, cloneable handle to an underlying backend cause
pub type BoxedSource = Arc<dyn StdError + Send + Sync + 'static>;

/// Main error type for secret-store operations.
///
/// The type is `Clone` so a single initialization outcome can be observed by
/// every caller that raced on the same store name.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SecretStoreError {
    /// No constructor is registered for the requested backend type
    #[error("Secret store backend not registered: {backend_type}")]
    NotRegistered { backend_type: String },

    /// No component descriptor exists for the requested store name
    #[error("Secret store '{store}' is not configured")]
    NotConfigured { store: String },

    /// The store was used before a successful `init`
    #[error("Secret store '{backend_type}' is not initialized")]
    NotInitialized { backend_type: String },

    /// A required metadata key is missing or malformed
    #[error("Invalid metadata '{key}': {reason}")]
    InvalidMetadata { key: String, reason: String },

    /// The secret does not exist in the backend
    #[error("Secret not found: {name}")]
    NotFound { name: String },

    /// The backend does not support the requested operation
    #[error("Operation '{operation}' is not supported by backend '{backend_type}'")]
    Unsupported {
        operation: String,
        backend_type: String,
    },

    /// The store's secret scope refuses access to this secret
    #[error("Access to secret '{secret}' is denied by the scope of store '{store}'")]
    PermissionDenied { store: String, secret: String },

    /// The operation did not complete within its deadline
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// The backend I/O call failed
    #[error("Backend '{backend}' failed: {message}")]
    BackendFailure {
        backend: String,
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    /// Configuration loading or validation failed
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Error kind without payload, for matching and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotRegistered,
    NotConfigured,
    NotInitialized,
    InvalidMetadata,
    NotFound,
    Unsupported,
    PermissionDenied,
    Timeout,
    BackendFailure,
    Config,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotRegistered => "not_registered",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::NotInitialized => "not_initialized",
            ErrorKind::InvalidMetadata => "invalid_metadata",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::Timeout => "timeout",
            ErrorKind::BackendFailure => "backend_failure",
            ErrorKind::Config => "config",
        };
        f.write_str(s)
    }
}

impl SecretStoreError {
    /// Create a backend-not-registered error
    pub fn not_registered<S: Into<String>>(backend_type: S) -> Self {
        Self::NotRegistered { backend_type: backend_type.into() }
    }

    /// Create a store-not-configured error
    pub fn not_configured<S: Into<String>>(store: S) -> Self {
        Self::NotConfigured { store: store.into() }
    }

    /// Create a not-initialized error
    pub fn not_initialized<S: Into<String>>(backend_type: S) -> Self {
        Self::NotInitialized { backend_type: backend_type.into() }
    }

    /// Create an invalid metadata error
    pub fn invalid_metadata<K: Into<String>, R: Into<String>>(key: K, reason: R) -> Self {
        Self::InvalidMetadata { key: key.into(), reason: reason.into() }
    }

    /// Create a missing metadata key error
    pub fn missing_metadata<K: Into<String>>(key: K) -> Self {
        Self::invalid_metadata(key, "missing required metadata key")
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound { name: name.into() }
    }

    /// Create an unsupported operation error
    pub fn unsupported<O: Into<String>, B: Into<String>>(operation: O, backend_type: B) -> Self {
        Self::Unsupported { operation: operation.into(), backend_type: backend_type.into() }
    }

    /// Create a permission denied error
    pub fn permission_denied<S: Into<String>, N: Into<String>>(store: S, secret: N) -> Self {
        Self::PermissionDenied { store: store.into(), secret: secret.into() }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), duration_ms }
    }

    /// Create a backend failure without an underlying cause
    pub fn backend_failure<B: Into<String>, M: Into<String>>(backend: B, message: M) -> Self {
        Self::BackendFailure { backend: backend.into(), message: message.into(), source: None }
    }

    /// Create a backend failure wrapping the backend's own error
    pub fn backend_failure_with_source<B, E>(backend: B, source: E) -> Self
    where
        B: Into<String>,
        E: StdError + Send + Sync + 'static,
    {
        Self::BackendFailure {
            backend: backend.into(),
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into() }
    }

    /// Get the payload-free kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SecretStoreError::NotRegistered { .. } => ErrorKind::NotRegistered,
            SecretStoreError::NotConfigured { .. } => ErrorKind::NotConfigured,
            SecretStoreError::NotInitialized { .. } => ErrorKind::NotInitialized,
            SecretStoreError::InvalidMetadata { .. } => ErrorKind::InvalidMetadata,
            SecretStoreError::NotFound { .. } => ErrorKind::NotFound,
            SecretStoreError::Unsupported { .. } => ErrorKind::Unsupported,
            SecretStoreError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            SecretStoreError::Timeout { .. } => ErrorKind::Timeout,
            SecretStoreError::BackendFailure { .. } => ErrorKind::BackendFailure,
            SecretStoreError::Config { .. } => ErrorKind::Config,
        }
    }

    /// Check whether a caller may reasonably retry the operation.
    ///
    /// Validation failures are deterministic and never retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SecretStoreError::BackendFailure { .. } | SecretStoreError::Timeout { .. })
    }

    /// Check whether this is the expected "secret does not exist" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, SecretStoreError::NotFound { .. })
    }

    /// Prefix a backend failure with the store name it was raised for
    pub(crate) fn with_store_context(self, store: &str) -> Self {
        match self {
            SecretStoreError::BackendFailure { backend, message, source } => {
                SecretStoreError::BackendFailure {
                    backend,
                    message: format!("store '{}': {}", store, message),
                    source,
                }
            }
            other => other,
        }
    }
}

impl From<config::ConfigError> for SecretStoreError {
    fn from(error: config::ConfigError) -> Self {
        Self::config(format!("Configuration loading failed: {}", error))
    }
}

impl From<validator::ValidationErrors> for SecretStoreError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let error_messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, error_messages.join(", "))
            })
            .collect();
        fields.sort();

        Self::config(format!("Validation failed: {}", fields.join("; ")))
    }
}
