//! # Observability
//!
//! Structured logging for secret store operations. Secret values are never
//! recorded; spans carry the store name, the operation and a per-call id.

pub mod logging;

pub use logging::{init_logging, log_config_info};
