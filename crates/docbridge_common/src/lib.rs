// --- File: crates/docbridge_common/src/lib.rs ---

pub mod error; // Error handling
pub mod http; // HTTP error responses
pub mod logging; // Logging utilities

// Re-export error types and utilities for easier access
pub use error::{
    config_error, connection_error, database_error, internal_error, not_found, timeout_error,
    validation_error, DocbridgeError, HttpStatusCode,
};

pub use http::{handle_json_result, IntoHttpResponse};

// Re-export logging utilities for easier access
pub use logging::{init, init_with_level, log_error, log_result};
