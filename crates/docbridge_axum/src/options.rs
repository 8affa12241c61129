use docbridge_config::DatabaseConfig;
use docbridge_db::{ConnectorOptions, DriverOptions, LogSink, TracingSink};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Options for [`register`](crate::register).
///
/// `S` is the driver's schema type; the schemas are bound as models once the
/// connection is ready.
pub struct PluginOptions<S> {
    pub uri: Option<String>,
    pub options: DriverOptions,
    pub sink: Option<Arc<dyn LogSink>>,
    pub schemas: Vec<(String, S)>,
    /// Upper bound on the wait for the first connection outcome. `None` waits forever.
    pub ready_timeout: Option<Duration>,
}

impl<S> PluginOptions<S> {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: Some(uri.into()),
            ..Self::default()
        }
    }

    /// Options from the `[database]` section of the application config.
    ///
    /// With `log_events` set, lifecycle lines go to `tracing` through [`TracingSink`].
    pub fn from_config(config: &DatabaseConfig) -> Self {
        let sink: Option<Arc<dyn LogSink>> = if config.log_events {
            Some(Arc::new(TracingSink))
        } else {
            None
        };

        Self {
            uri: Some(config.uri.clone()),
            options: config.options.clone(),
            sink,
            schemas: Vec::new(),
            ready_timeout: config.ready_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: S) -> Self {
        self.schemas.push((name.into(), schema));
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

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = Some(timeout);
        self
    }

    /// Split into connector options and the schemas to bind later
    pub(crate) fn into_parts(self) -> (ConnectorOptions, Vec<(String, S)>, Option<Duration>) {
        let connector = ConnectorOptions {
            uri: self.uri,
            options: self.options,
            sink: self.sink,
        };
        (connector, self.schemas, self.ready_timeout)
    }
}

impl<S> Default for PluginOptions<S> {
    fn default() -> Self {
        Self {
            uri: None,
            options: DriverOptions::new(),
            sink: None,
            schemas: Vec::new(),
            ready_timeout: None,
        }
    }
}

impl<S> fmt::Debug for PluginOptions<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schemas: Vec<&str> = self.schemas.iter().map(|(name, _)| name.as_str()).collect();
        f.debug_struct("PluginOptions")
            .field("uri", &self.uri)
            .field("options", &self.options)
            .field("sink", &self.sink.is_some())
            .field("schemas", &schemas)
            .field("ready_timeout", &self.ready_timeout)
            .finish()
    }
}
