use docbridge_common::error::{connection_error, timeout_error, DocbridgeError};
use docbridge_db::{ConnectorError, DriverError};
use std::time::Duration;
use thiserror::Error;

/// Why registering the database with the application failed
#[derive(Debug, Error)]
pub enum RegisterError {
    /// The connector could not be built (bad uri, no runtime, already closed)
    #[error("Connector could not be created: {0}")]
    Connector(#[source] ConnectorError),

    /// The driver reported an error before the connection was ready
    #[error("Unable to connect to database: {0}")]
    Connection(#[source] DriverError),

    #[error("Database was not ready within {0:?}")]
    Timeout(Duration),
}

impl From<ConnectorError> for RegisterError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Connection(err) => RegisterError::Connection(err),
            other => RegisterError::Connector(other),
        }
    }
}

impl From<RegisterError> for DocbridgeError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Connector(err) => err.into(),
            RegisterError::Connection(_) => connection_error(err),
            RegisterError::Timeout(_) => timeout_error(err),
        }
    }
}
