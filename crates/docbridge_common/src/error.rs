// --- File: crates/docbridge_common/src/error.rs ---
use std::fmt;
use thiserror::Error;

/// The base error type surfaced to HTTP callers.
///
/// Crate-specific errors convert into this with `From` impls next to their definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocbridgeError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request input failed validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The database connection is not usable
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error reported by the database driver
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A named resource (model, route, document) does not exist
    #[error("Not found: {0}")]
    NotFoundError(String),

    /// An operation did not finish in time
    #[error("Timeout: {0}")]
    TimeoutError(String),

    /// Error occurred due to an internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// A trait for converting errors to HTTP status codes.
pub trait HttpStatusCode {
    /// Returns the HTTP status code for this error.
    fn status_code(&self) -> u16;
}

impl HttpStatusCode for DocbridgeError {
    fn status_code(&self) -> u16 {
        match self {
            DocbridgeError::ConfigError(_) => 500,
            DocbridgeError::ValidationError(_) => 400,
            DocbridgeError::ConnectionError(_) => 503,
            DocbridgeError::DatabaseError(_) => 500,
            DocbridgeError::NotFoundError(_) => 404,
            DocbridgeError::TimeoutError(_) => 504,
            DocbridgeError::InternalError(_) => 500,
        }
    }
}

impl From<serde_json::Error> for DocbridgeError {
    fn from(err: serde_json::Error) -> Self {
        internal_error(err)
    }
}

// Utility functions for error handling
pub fn config_error<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::ConfigError(message.to_string())
}

pub fn connection_error<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::ConnectionError(message.to_string())
}

pub fn validation_error<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::ValidationError(message.to_string())
}

pub fn database_error<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::DatabaseError(message.to_string())
}

pub fn not_found<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::NotFoundError(message.to_string())
}

pub fn timeout_error<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::TimeoutError(message.to_string())
}

pub fn internal_error<T: fmt::Display>(message: T) -> DocbridgeError {
    DocbridgeError::InternalError(message.to_string())
}
