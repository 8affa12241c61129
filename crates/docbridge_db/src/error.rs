//! Error types for the connector and its drivers

use docbridge_common::error::{config_error, connection_error, not_found, DocbridgeError};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Error reported by a database driver.
///
/// Cloneable so a single failure can be stored in the lifecycle state and
/// broadcast to every subscriber at the same time.
#[derive(Debug, Clone)]
pub struct DriverError {
    message: String,
    source: Option<Arc<dyn StdError + Send + Sync>>,
}

impl DriverError {
    /// Create an error carrying only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying driver error; its text becomes the message
    pub fn from_source<E>(source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: source.to_string(),
            source: Some(Arc::new(source)),
        }
    }

    /// Wrap an underlying driver error behind a context message
    pub fn with_context<E>(context: &str, source: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self {
            message: format!("{}: {}", context, source),
            source: Some(Arc::new(source)),
        }
    }

    /// The human readable message, as logged by the connector
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for DriverError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|source| source as &(dyn StdError + 'static))
    }
}

impl PartialEq for DriverError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

/// Errors that can occur when working with the connector
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConnectorError {
    /// Missing or invalid construction input; raised before any connection attempt
    #[error("Connector configuration error: {0}")]
    Config(String),

    /// The driver could not connect, or failed while closing
    #[error("Unable to connect to database: {0}")]
    Connection(DriverError),

    /// Lookup of a name that was never registered
    #[error("Model '{0}' does not exist")]
    ModelNotFound(String),

    /// The connector was built outside a tokio runtime
    #[error("Connector requires a tokio runtime: {0}")]
    Runtime(String),

    /// The lifecycle channels were dropped while waiting
    #[error("Connector has been closed")]
    Closed,
}

impl From<DriverError> for ConnectorError {
    fn from(err: DriverError) -> Self {
        ConnectorError::Connection(err)
    }
}

impl From<ConnectorError> for DocbridgeError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Config(_) | ConnectorError::Runtime(_) => config_error(err),
            ConnectorError::Connection(_) | ConnectorError::Closed => connection_error(err),
            ConnectorError::ModelNotFound(_) => not_found(err),
        }
    }
}
