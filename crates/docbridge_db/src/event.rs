//! Public lifecycle vocabulary

use crate::error::DriverError;
use std::fmt;

pub const READY_LOG: &str = "Connection to database ready";
pub const OPENED_MESSAGE: &str = "Connection to database opened";
pub const CLOSED_MESSAGE: &str = "Connection to database closed";
pub const DISCONNECTED_LOG: &str = "Connection to database disconnected";
pub const DISCONNECTED_MESSAGE: &str = "Database disconnected";

/// Payload of the `ready` event for `uri`
pub fn ready_message(uri: &str) -> String {
    format!("✔ Connected to {}", uri)
}

/// Log line written when the driver reports a connection error
pub fn error_log(error: &DriverError) -> String {
    format!("Unable to connect to database: {}", error.message())
}

/// Event re-emitted by the connector for each driver notification
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    Ready(String),
    Error(DriverError),
    Open(String),
    Close(String),
    Disconnected(String),
}

impl ConnectorEvent {
    /// Stable event name
    pub fn name(&self) -> &'static str {
        match self {
            ConnectorEvent::Ready(_) => "ready",
            ConnectorEvent::Error(_) => "error",
            ConnectorEvent::Open(_) => "open",
            ConnectorEvent::Close(_) => "close",
            ConnectorEvent::Disconnected(_) => "disconnected",
        }
    }

    /// Event payload as text
    pub fn message(&self) -> String {
        match self {
            ConnectorEvent::Error(err) => err.to_string(),
            ConnectorEvent::Ready(m)
            | ConnectorEvent::Open(m)
            | ConnectorEvent::Close(m)
            | ConnectorEvent::Disconnected(m) => m.clone(),
        }
    }
}

/// Connection state as last observed from the driver.
///
/// `Connecting → Ready → Open → (Disconnected ⇄ Ready)* → Closed`, plus
/// `Connecting → Failed`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LifecycleState {
    #[default]
    Connecting,
    Ready,
    Open,
    Disconnected,
    Closed,
    Failed(DriverError),
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Connecting => "connecting",
            LifecycleState::Ready => "ready",
            LifecycleState::Open => "open",
            LifecycleState::Disconnected => "disconnected",
            LifecycleState::Closed => "closed",
            LifecycleState::Failed(_) => "failed",
        }
    }

    /// Whether the connection is currently usable
    pub fn is_connected(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Open)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ready_message() {
        assert_eq!(
            ready_message("mongodb://localhost:27017/test"),
            "✔ Connected to mongodb://localhost:27017/test"
        );
    }

    #[test]
    fn test_event_names_and_messages() {
        let err = DriverError::new("connect ECONNREFUSED");
        assert_eq!(ConnectorEvent::Error(err.clone()).name(), "error");
        assert_eq!(ConnectorEvent::Error(err).message(), "connect ECONNREFUSED");
        assert_eq!(
            ConnectorEvent::Close(CLOSED_MESSAGE.to_string()).name(),
            "close"
        );
        assert_eq!(
            ConnectorEvent::Disconnected(DISCONNECTED_MESSAGE.to_string()).message(),
            "Database disconnected"
        );
    }

    #[test]
    fn test_state_is_connected() {
        assert!(LifecycleState::Open.is_connected());
        assert!(!LifecycleState::Disconnected.is_connected());
        assert_eq!(LifecycleState::default(), LifecycleState::Connecting);
    }
}
