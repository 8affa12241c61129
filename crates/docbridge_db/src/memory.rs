//! In-memory driver
//!
//! A scripted [`Driver`] that never touches the network. Tests and demos use
//! it to decide whether the connection succeeds and to fire lifecycle
//! notifications on demand.

use crate::driver::{BoxFuture, Driver, DriverEvents, DriverOptions};
use crate::error::DriverError;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// What a new connection does on its own
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectBehaviour {
    /// Report `connected` then `open`
    Succeed,
    /// Report `error` with the given message
    Fail(String),
    /// Report nothing; the test drives the connection by hand
    Hold,
}

#[derive(Debug)]
pub struct MemoryDriver {
    behaviour: ConnectBehaviour,
    attempts: AtomicUsize,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::with_behaviour(ConnectBehaviour::Succeed)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_behaviour(ConnectBehaviour::Fail(message.into()))
    }

    pub fn holding() -> Self {
        Self::with_behaviour(ConnectBehaviour::Hold)
    }

    pub fn with_behaviour(behaviour: ConnectBehaviour) -> Self {
        Self {
            behaviour,
            attempts: AtomicUsize::new(0),
        }
    }

    /// Number of `create_connection` calls so far
    pub fn connection_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Default for MemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryConnectionInner {
    uri: String,
    options: DriverOptions,
    events: DriverEvents,
    closed: AtomicBool,
}

/// Connection handle of the in-memory driver
#[derive(Clone)]
pub struct MemoryConnection {
    inner: Arc<MemoryConnectionInner>,
}

impl MemoryConnection {
    pub fn uri(&self) -> &str {
        &self.inner.uri
    }

    /// Options exactly as the connector passed them
    pub fn options(&self) -> &DriverOptions {
        &self.inner.options
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Report a successful connect
    pub fn connect(&self) {
        self.inner.events.connected();
        self.inner.events.open();
    }

    pub fn fail(&self, message: impl Into<String>) {
        self.inner.events.error(DriverError::new(message));
    }

    pub fn disconnect(&self) {
        self.inner.events.disconnected();
    }

    pub fn reconnect(&self) {
        self.inner.events.connected();
    }

    /// Close from the driver side; reports `close` once
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.events.close();
        }
    }
}

impl fmt::Debug for MemoryConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryConnection")
            .field("uri", &self.inner.uri)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Field names the model should carry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySchema {
    pub fields: Vec<String>,
}

impl MemorySchema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryModel {
    name: String,
    fields: Vec<String>,
}

impl MemoryModel {
    pub fn model_name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Driver for MemoryDriver {
    type Connection = MemoryConnection;
    type Schema = MemorySchema;
    type Model = MemoryModel;

    fn name(&self) -> &str {
        "memory"
    }

    fn create_connection(
        &self,
        uri: &str,
        options: &DriverOptions,
        events: DriverEvents,
    ) -> Result<MemoryConnection, DriverError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let connection = MemoryConnection {
            inner: Arc::new(MemoryConnectionInner {
                uri: uri.to_string(),
                options: options.clone(),
                events,
                closed: AtomicBool::new(false),
            }),
        };

        match &self.behaviour {
            ConnectBehaviour::Succeed => connection.connect(),
            ConnectBehaviour::Fail(message) => connection.fail(message.clone()),
            ConnectBehaviour::Hold => {}
        }

        Ok(connection)
    }

    fn model(&self, _connection: &MemoryConnection, name: &str, schema: MemorySchema) -> MemoryModel {
        MemoryModel {
            name: name.to_string(),
            fields: schema.fields,
        }
    }

    fn close<'a>(&'a self, connection: &'a MemoryConnection) -> BoxFuture<'a, (), DriverError> {
        Box::pin(async move {
            connection.close();
            Ok(())
        })
    }
}
