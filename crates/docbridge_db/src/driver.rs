//! Driver seam
//!
//! The connector never talks to a database itself. It asks a [`Driver`] for a
//! connection handle, binds schemas through it, and listens to the lifecycle
//! notifications the driver reports on a [`DriverEvents`] sender.

use crate::error::DriverError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::trace;

/// Type alias for a boxed future that returns a Result
pub type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Driver options, keyed by the driver's own option names
pub type DriverOptions = BTreeMap<String, Value>;

/// The option forced on every connection unless the caller overrides it
pub const DEFAULT_OPTION: (&str, &str) = ("appName", "docbridge");

/// Merge caller options over the built-in default. Caller keys win.
///
/// Option names are compared without regard to ASCII case, as connection
/// strings do. When the caller passes several spellings of one name, the
/// all-lowercase one wins: that is the spelling the environment config
/// layer produces, and it sorts last.
pub fn merge_options(config: DriverOptions) -> DriverOptions {
    let mut merged = DriverOptions::new();
    merged.insert(
        DEFAULT_OPTION.0.to_string(),
        Value::String(DEFAULT_OPTION.1.to_string()),
    );
    for (key, value) in config {
        merged.retain(|existing, _| !existing.eq_ignore_ascii_case(&key));
        merged.insert(key, value);
    }
    merged
}

/// Lifecycle notifications as reported by a driver
#[derive(Debug, Clone, PartialEq)]
pub enum DriverEvent {
    Connected,
    Error(DriverError),
    Open,
    Close,
    Disconnected,
}

/// Sending half handed to the driver at connection time.
///
/// Sending never blocks, so it is safe to call from synchronous driver
/// callbacks. Events sent after the connector is gone are dropped.
#[derive(Debug, Clone)]
pub struct DriverEvents {
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl DriverEvents {
    /// Create a sender and the receiver the connector relays from
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DriverEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn connected(&self) {
        self.emit(DriverEvent::Connected);
    }

    pub fn error(&self, error: DriverError) {
        self.emit(DriverEvent::Error(error));
    }

    pub fn open(&self) {
        self.emit(DriverEvent::Open);
    }

    pub fn close(&self) {
        self.emit(DriverEvent::Close);
    }

    pub fn disconnected(&self) {
        self.emit(DriverEvent::Disconnected);
    }

    pub fn emit(&self, event: DriverEvent) {
        if self.tx.send(event).is_err() {
            trace!("connector dropped, discarding driver event");
        }
    }
}

/// A document-database driver the connector can wrap.
///
/// Schemas and models are opaque to the connector: it hands the schema to
/// [`Driver::model`] and stores whatever comes back.
pub trait Driver: Send + Sync + 'static {
    /// Handle to one logical connection; cheap to clone
    type Connection: Clone + Send + Sync + 'static;
    /// Schema definition understood by the driver
    type Schema: Send;
    /// Handle returned when a schema is bound to a name
    type Model: Clone + Send + Sync + 'static;

    /// Short driver name, used in logs and status output
    fn name(&self) -> &str;

    /// Start connecting to `uri` and return the handle at once.
    ///
    /// Progress must be reported through `events`: `connected` then `open` on
    /// success, `error` on failure. `Err` is reserved for failures detected
    /// before anything was started.
    fn create_connection(
        &self,
        uri: &str,
        options: &DriverOptions,
        events: DriverEvents,
    ) -> Result<Self::Connection, DriverError>;

    /// Bind `schema` under `name` against `connection`
    fn model(&self, connection: &Self::Connection, name: &str, schema: Self::Schema)
        -> Self::Model;

    /// Close the connection; the driver reports `close` when done
    fn close<'a>(&'a self, connection: &'a Self::Connection) -> BoxFuture<'a, (), DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_default() {
        let merged = merge_options(DriverOptions::new());
        assert_eq!(merged.get("appName"), Some(&json!("docbridge")));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_merge_caller_wins() {
        let mut config = DriverOptions::new();
        config.insert("appName".to_string(), json!("blog"));
        config.insert("maxPoolSize".to_string(), json!(10));

        let merged = merge_options(config);
        assert_eq!(merged.get("appName"), Some(&json!("blog")));
        assert_eq!(merged.get("maxPoolSize"), Some(&json!(10)));
    }

    #[test]
    fn test_merge_caller_key_in_other_case_replaces_default() {
        let mut config = DriverOptions::new();
        config.insert("appname".to_string(), json!("blog"));

        let merged = merge_options(config);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("appname"), Some(&json!("blog")));
        assert_eq!(merged.get("appName"), None);
    }

    #[test]
    fn test_merge_collapses_case_variants() {
        let mut config = DriverOptions::new();
        config.insert("appName".to_string(), json!("blog"));
        config.insert("appname".to_string(), json!("fromenv"));
        config.insert("maxPoolSize".to_string(), json!(4));

        let merged = merge_options(config);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get("appname"), Some(&json!("fromenv")));
        assert_eq!(merged.get("maxPoolSize"), Some(&json!(4)));
    }

    #[tokio::test]
    async fn test_events_are_delivered_in_order() {
        let (events, mut rx) = DriverEvents::channel();
        events.connected();
        events.open();
        events.close();

        assert_eq!(rx.recv().await, Some(DriverEvent::Connected));
        assert_eq!(rx.recv().await, Some(DriverEvent::Open));
        assert_eq!(rx.recv().await, Some(DriverEvent::Close));
    }

    #[test]
    fn test_send_after_receiver_dropped_is_silent() {
        let (events, rx) = DriverEvents::channel();
        drop(rx);
        events.disconnected();
    }
}
