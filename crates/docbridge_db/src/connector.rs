//! Connector
//!
//! Owns one driver connection, relays its lifecycle notifications under a
//! stable vocabulary, and keeps the name → model registry.

use crate::driver::{merge_options, Driver, DriverEvent, DriverEvents, DriverOptions};
use crate::error::{ConnectorError, DriverError};
use crate::event::{
    error_log, ready_message, ConnectorEvent, LifecycleState, CLOSED_MESSAGE,
    DISCONNECTED_LOG, DISCONNECTED_MESSAGE, OPENED_MESSAGE, READY_LOG,
};
use crate::sink::{LogSink, NoopSink};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, error, info, warn};

/// Capacity of the event broadcast; slow subscribers lag rather than block the relay
const EVENT_CAPACITY: usize = 64;

/// Construction input for a [`Connector`]
#[derive(Clone, Default)]
pub struct ConnectorOptions {
    /// Connection target; required and non-empty
    pub uri: Option<String>,
    /// Driver options, merged over the built-in default
    pub options: DriverOptions,
    /// Receives the lifecycle log lines; `None` means [`NoopSink`]
    pub sink: Option<Arc<dyn LogSink>>,
}

impl ConnectorOptions {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Default::default()
        }
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options.extend(options);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn with_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub fn with_shared_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }
}

impl fmt::Debug for ConnectorOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorOptions")
            .field("uri", &self.uri)
            .field("options", &self.options)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

/// First outcome of the connection attempt; set once
#[derive(Debug, Clone, PartialEq)]
enum Readiness {
    Pending,
    Ready,
    Failed(DriverError),
}

/// Wrapper around one driver connection.
///
/// Built with [`Connector::new`], which validates the uri, requests the
/// connection from the driver and starts relaying its notifications. The
/// connection handle is never replaced for the connector's lifetime.
pub struct Connector<D: Driver> {
    driver: Arc<D>,
    uri: String,
    options: DriverOptions,
    sink: Arc<dyn LogSink>,
    connection: D::Connection,
    models: RwLock<HashMap<String, D::Model>>,
    state: Arc<watch::Sender<LifecycleState>>,
    readiness: Arc<watch::Sender<Readiness>>,
    events: broadcast::Sender<ConnectorEvent>,
    closed: AtomicBool,
}

impl<D: Driver> Connector<D> {
    /// Create a connector and start connecting.
    ///
    /// # Errors
    ///
    /// * [`ConnectorError::Config`] if `uri` is missing or empty; the driver is not called
    /// * [`ConnectorError::Runtime`] if called outside a tokio runtime
    /// * [`ConnectorError::Connection`] if the driver refuses to start; the
    ///   failure is also written to the sink like any connection error
    pub fn new(driver: D, options: ConnectorOptions) -> Result<Arc<Self>, ConnectorError> {
        Self::with_shared_driver(Arc::new(driver), options)
    }

    /// Same as [`Connector::new`] for a driver shared with other code
    pub fn with_shared_driver(
        driver: Arc<D>,
        options: ConnectorOptions,
    ) -> Result<Arc<Self>, ConnectorError> {
        let uri = match options.uri {
            None => return Err(ConnectorError::Config("uri must be a string".to_string())),
            Some(uri) if uri.is_empty() => {
                return Err(ConnectorError::Config("uri is required".to_string()))
            }
            Some(uri) => uri,
        };

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| ConnectorError::Runtime(err.to_string()))?;

        let sink: Arc<dyn LogSink> = match options.sink {
            Some(sink) => sink,
            None => Arc::new(NoopSink),
        };
        let merged = merge_options(options.options);

        let (state, _) = watch::channel(LifecycleState::Connecting);
        let state = Arc::new(state);
        let (readiness, _) = watch::channel(Readiness::Pending);
        let readiness = Arc::new(readiness);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        // The relay exists before the driver starts, so no notification is missed
        let (driver_events, driver_rx) = DriverEvents::channel();
        let relay = Relay {
            uri: uri.clone(),
            sink: sink.clone(),
            state: state.clone(),
            readiness: readiness.clone(),
            events: events.clone(),
        };
        runtime.spawn(relay.run(driver_rx));

        info!(driver = driver.name(), uri = %uri, "Connecting to database");
        let connection = match driver.create_connection(&uri, &merged, driver_events.clone()) {
            Ok(connection) => connection,
            Err(err) => {
                driver_events.error(err.clone());
                return Err(ConnectorError::Connection(err));
            }
        };

        Ok(Arc::new(Self {
            driver,
            uri,
            options: merged,
            sink,
            connection,
            models: RwLock::new(HashMap::new()),
            state,
            readiness,
            events,
            closed: AtomicBool::new(false),
        }))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Options as passed to the driver, defaults included
    pub fn options(&self) -> &DriverOptions {
        &self.options
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn connection(&self) -> &D::Connection {
        &self.connection
    }

    /// Write a line to the configured sink
    pub fn log(&self, message: &str) {
        self.sink.log(message);
    }

    /// Subscribe to re-emitted events. Events fired before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectorEvent> {
        self.events.subscribe()
    }

    /// Latest observed lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state.borrow().clone()
    }

    /// Watch lifecycle transitions; the current state is visible immediately
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Wait for the first outcome of the connection attempt.
    ///
    /// Resolves once the driver has reported `connected`, or fails with the
    /// first reported error. A `close` seen while waiting is logged and the
    /// wait continues. There is no timeout here.
    pub async fn wait_ready(&self) -> Result<(), ConnectorError> {
        let mut readiness = self.readiness.subscribe();
        let mut state = self.state.subscribe();
        loop {
            let current = readiness.borrow_and_update().clone();
            match current {
                Readiness::Ready => return Ok(()),
                Readiness::Failed(err) => return Err(ConnectorError::Connection(err)),
                Readiness::Pending => {}
            }

            tokio::select! {
                changed = readiness.changed() => {
                    if changed.is_err() {
                        return Err(ConnectorError::Closed);
                    }
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        return Err(ConnectorError::Closed);
                    }
                    let closed = matches!(*state.borrow_and_update(), LifecycleState::Closed);
                    if closed {
                        warn!(uri = %self.uri, "Connection closed before it became ready");
                        self.sink.log(CLOSED_MESSAGE);
                    }
                }
            }
        }
    }

    /// Bind each schema through the driver and store the model under its name.
    ///
    /// Registering a name that already exists replaces the previous model.
    pub fn set_models<I, K>(&self, schemas: I)
    where
        I: IntoIterator<Item = (K, D::Schema)>,
        K: Into<String>,
    {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        for (name, schema) in schemas {
            let name = name.into();
            let model = self.driver.model(&self.connection, &name, schema);
            if models.insert(name.clone(), model).is_some() {
                debug!(model = %name, "Replaced registered model");
            } else {
                debug!(model = %name, "Registered model");
            }
        }
    }

    /// Look up a registered model.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::ModelNotFound`] carrying `name` if it was never registered.
    pub fn get_model(&self, name: &str) -> Result<D::Model, ConnectorError> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| ConnectorError::ModelNotFound(name.to_string()))
    }

    pub fn has_model(&self, name: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted
    pub fn model_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Snapshot of the registry
    pub fn models(&self) -> HashMap<String, D::Model> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the underlying connection. Once it succeeded, later calls are
    /// no-ops; after a failed close the next call tries again.
    pub async fn close(&self) -> Result<(), ConnectorError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(uri = %self.uri, "Closing database connection");
        if let Err(err) = self.driver.close(&self.connection).await {
            warn!(uri = %self.uri, error = %err, "Closing database connection failed");
            self.closed.store(false, Ordering::SeqCst);
            return Err(ConnectorError::Connection(err));
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<D: Driver> fmt::Debug for Connector<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("driver", &self.driver.name())
            .field("uri", &self.uri)
            .field("options", &self.options)
            .field("state", &*self.state.borrow())
            .field("models", &self.model_names())
            .finish()
    }
}

/// Turns driver notifications into connector state, log lines and events
struct Relay {
    uri: String,
    sink: Arc<dyn LogSink>,
    state: Arc<watch::Sender<LifecycleState>>,
    readiness: Arc<watch::Sender<Readiness>>,
    events: broadcast::Sender<ConnectorEvent>,
}

impl Relay {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<DriverEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        debug!(uri = %self.uri, "Driver event stream ended");
    }

    fn handle(&self, event: DriverEvent) {
        let emitted = match event {
            DriverEvent::Connected => {
                self.sink.log(READY_LOG);
                info!(uri = %self.uri, "Connection to database ready");
                self.state.send_replace(LifecycleState::Ready);
                self.resolve(Readiness::Ready);
                ConnectorEvent::Ready(ready_message(&self.uri))
            }
            DriverEvent::Error(err) => {
                self.sink.log(&error_log(&err));
                error!(uri = %self.uri, error = %err, "Unable to connect to database");
                // Errors after a successful connect do not change the state
                self.state.send_if_modified(|state| {
                    if *state == LifecycleState::Connecting {
                        *state = LifecycleState::Failed(err.clone());
                        true
                    } else {
                        false
                    }
                });
                self.resolve(Readiness::Failed(err.clone()));
                ConnectorEvent::Error(err)
            }
            DriverEvent::Open => {
                debug!(uri = %self.uri, "Connection to database opened");
                self.state.send_replace(LifecycleState::Open);
                // open and disconnected both imply the connection was reached
                self.resolve(Readiness::Ready);
                ConnectorEvent::Open(OPENED_MESSAGE.to_string())
            }
            DriverEvent::Close => {
                self.sink.log(CLOSED_MESSAGE);
                info!(uri = %self.uri, "Connection to database closed");
                self.state.send_replace(LifecycleState::Closed);
                ConnectorEvent::Close(CLOSED_MESSAGE.to_string())
            }
            DriverEvent::Disconnected => {
                self.sink.log(DISCONNECTED_LOG);
                warn!(uri = %self.uri, "Connection to database disconnected");
                self.state.send_replace(LifecycleState::Disconnected);
                self.resolve(Readiness::Ready);
                ConnectorEvent::Disconnected(DISCONNECTED_MESSAGE.to_string())
            }
        };

        // No subscribers is fine
        let _ = self.events.send(emitted);
    }

    fn resolve(&self, outcome: Readiness) {
        self.readiness.send_if_modified(|current| {
            if *current == Readiness::Pending {
                *current = outcome;
                true
            } else {
                false
            }
        });
    }
}
