//! # Error Handling
//!
//! Error handling for the secret-store facade. Every public operation returns
//! [`Result`], whose error carries an [`ErrorKind`] and a human-readable message.

mod types;

pub use types::{BoxedSource, ErrorKind, Result, SecretStoreError};
