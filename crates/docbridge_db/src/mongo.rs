//! MongoDB driver
//!
//! Adapts the official `mongodb` client to the [`Driver`] seam:
//!
//! - connection options are appended to the connection string
//! - the client is built and pinged on a spawned task
//! - SDAM heartbeats are turned into `disconnected` / `connected` notifications
//! - models resolve their collection lazily once the client is up
//!
//! # Example
//!
//! ```rust,no_run
//! use docbridge_db::{Connector, ConnectorOptions, MongoDriver, MongoSchema};
//! use bson::doc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = Connector::new(
//!     MongoDriver::new(),
//!     ConnectorOptions::new("mongodb://localhost:27017/blog"),
//! )?;
//! connector.wait_ready().await?;
//!
//! connector.set_models([("Post", MongoSchema::new().index(doc! { "createdAt": -1 }, None))]);
//! let posts = connector.get_model("Post")?.collection().await?;
//! posts.insert_one(doc! { "title": "Hello" }).await?;
//! # Ok(())
//! # }
//! ```

use crate::driver::{BoxFuture, Driver, DriverEvents, DriverOptions};
use crate::error::DriverError;
use bson::{doc, Document};
use mongodb::event::sdam::SdamEvent;
use mongodb::event::EventHandler;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Database used when the connection string names none
pub const DEFAULT_DATABASE: &str = "test";

/// Driver backed by the official MongoDB client
#[derive(Debug, Clone)]
pub struct MongoDriver {
    default_database: String,
}

impl MongoDriver {
    pub fn new() -> Self {
        Self {
            default_database: DEFAULT_DATABASE.to_string(),
        }
    }

    /// Database to use when the connection string has no path
    pub fn with_default_database(mut self, name: impl Into<String>) -> Self {
        self.default_database = name.into();
        self
    }
}

impl Default for MongoDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Append `options` to `uri` as query parameters.
///
/// Keys already present in the uri are left alone, so an explicit
/// `?appName=...` beats the defaults. Keys are matched ignoring ASCII case;
/// of two spellings in `options` the later one is kept.
pub fn connection_string(uri: &str, options: &DriverOptions) -> Result<String, DriverError> {
    let existing: Vec<String> = uri
        .split_once('?')
        .map(|(_, query)| {
            query
                .split('&')
                .filter_map(|pair| pair.split('=').next())
                .map(|key| key.to_ascii_lowercase())
                .collect()
        })
        .unwrap_or_default();

    // the driver rejects repeated options, and option names ignore case
    let mut pairs: Vec<(&str, String)> = Vec::with_capacity(options.len());
    for (key, value) in options {
        if existing.contains(&key.to_ascii_lowercase()) {
            continue;
        }
        pairs.retain(|(seen, _)| !seen.eq_ignore_ascii_case(key));
        pairs.push((key.as_str(), option_value(value)));
    }

    if pairs.is_empty() {
        return Ok(uri.to_string());
    }

    let query = serde_urlencoded::to_string(&pairs)
        .map_err(|err| DriverError::with_context("Invalid driver options", err))?;

    let separator = if uri.contains('?') {
        "&"
    } else {
        let hosts = uri.split_once("://").map(|(_, rest)| rest).unwrap_or(uri);
        // the driver requires a slash between hosts and options
        if hosts.contains('/') {
            "?"
        } else {
            "/?"
        }
    };

    Ok(format!("{}{}{}", uri, separator, query))
}

fn option_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Collection name for a model name: lowercase and pluralised
pub fn default_collection_name(model_name: &str) -> String {
    let lower = model_name.to_lowercase();
    if lower.ends_with('s') {
        return lower;
    }
    if let Some(stem) = lower.strip_suffix('y') {
        if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
            return format!("{}ies", stem);
        }
    }
    if lower.ends_with('x') || lower.ends_with("ch") || lower.ends_with("sh") {
        return format!("{}es", lower);
    }
    format!("{}s", lower)
}

#[derive(Clone)]
enum ClientSlot {
    Pending,
    Ready(Client),
    Failed(DriverError),
    Closed,
}

struct MongoConnectionInner {
    default_database: String,
    client: watch::Sender<ClientSlot>,
    events: DriverEvents,
    established: AtomicBool,
    up: AtomicBool,
    closed: AtomicBool,
}

impl MongoConnectionInner {
    fn on_sdam_event(&self, event: SdamEvent) {
        if !self.established.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
            return;
        }
        match event {
            SdamEvent::ServerHeartbeatFailed(_) => {
                if self.up.swap(false, Ordering::SeqCst) {
                    self.events.disconnected();
                }
            }
            SdamEvent::ServerHeartbeatSucceeded(_) => {
                if !self.up.swap(true, Ordering::SeqCst) {
                    self.events.connected();
                }
            }
            _ => {}
        }
    }
}

/// Connection handle of the MongoDB driver.
///
/// Returned before the client exists; [`MongoConnection::client`] waits for it.
#[derive(Clone)]
pub struct MongoConnection {
    inner: Arc<MongoConnectionInner>,
}

impl MongoConnection {
    fn pending(default_database: String, events: DriverEvents) -> Self {
        let (client, _) = watch::channel(ClientSlot::Pending);
        Self {
            inner: Arc::new(MongoConnectionInner {
                default_database,
                client,
                events,
                established: AtomicBool::new(false),
                up: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            }),
        }
    }

    async fn establish(&self, target: String) {
        let outcome = self.open_client(&target).await;
        self.finish_connect(outcome).await;
    }

    /// Publish the outcome of a connect attempt unless the connection was
    /// closed meanwhile. The slot only ever leaves `Pending` once, so a close
    /// racing with the connect either sees the client or keeps it out.
    async fn finish_connect(&self, outcome: Result<Client, DriverError>) {
        match outcome {
            Ok(client) => {
                let mut spare = Some(client);
                self.inner.client.send_if_modified(|slot| {
                    if !matches!(slot, ClientSlot::Pending) {
                        return false;
                    }
                    match spare.take() {
                        Some(client) => {
                            *slot = ClientSlot::Ready(client);
                            // reported under the slot lock, so a close always comes after
                            self.inner.up.store(true, Ordering::SeqCst);
                            self.inner.established.store(true, Ordering::SeqCst);
                            self.inner.events.connected();
                            self.inner.events.open();
                            true
                        }
                        None => false,
                    }
                });
                if let Some(client) = spare {
                    debug!("Connection closed while connecting, shutting client down");
                    client.shutdown().await;
                }
            }
            Err(err) => {
                error!(error = %err, "MongoDB connection failed");
                self.inner.client.send_if_modified(|slot| {
                    if matches!(slot, ClientSlot::Pending) {
                        *slot = ClientSlot::Failed(err.clone());
                        self.inner.events.error(err.clone());
                        true
                    } else {
                        false
                    }
                });
            }
        }
    }

    async fn open_client(&self, target: &str) -> Result<Client, DriverError> {
        let mut options = ClientOptions::parse(target)
            .await
            .map_err(|err| DriverError::with_context("Invalid connection string", err))?;

        let watcher: Weak<MongoConnectionInner> = Arc::downgrade(&self.inner);
        options.sdam_event_handler = Some(EventHandler::callback(move |event: SdamEvent| {
            if let Some(inner) = watcher.upgrade() {
                inner.on_sdam_event(event);
            }
        }));

        let client = Client::with_options(options).map_err(DriverError::from_source)?;

        self.database_of(&client)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(DriverError::from_source)?;

        info!("Connected to MongoDB");
        Ok(client)
    }

    fn database_of(&self, client: &Client) -> Database {
        client
            .default_database()
            .unwrap_or_else(|| client.database(&self.inner.default_database))
    }

    /// Wait for the client; fails if the connection failed or was closed
    pub async fn client(&self) -> Result<Client, DriverError> {
        let mut slot = self.inner.client.subscribe();
        loop {
            let current = slot.borrow_and_update().clone();
            match current {
                ClientSlot::Ready(client) => return Ok(client),
                ClientSlot::Failed(err) => return Err(err),
                ClientSlot::Closed => {
                    return Err(DriverError::new("Connection to database closed"))
                }
                ClientSlot::Pending => {}
            }
            if slot.changed().await.is_err() {
                return Err(DriverError::new("Connection to database dropped"));
            }
        }
    }

    /// The connection's database, once connected
    pub async fn database(&self) -> Result<Database, DriverError> {
        let client = self.client().await?;
        Ok(self.database_of(&client))
    }

    pub fn is_connected(&self) -> bool {
        self.inner.established.load(Ordering::SeqCst)
            && self.inner.up.load(Ordering::SeqCst)
            && !self.inner.closed.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let ClientSlot::Ready(client) = self.inner.client.send_replace(ClientSlot::Closed) {
            client.shutdown().await;
        }
        self.inner.events.close();
    }
}

impl fmt::Debug for MongoConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoConnection")
            .field("default_database", &self.inner.default_database)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Schema for a MongoDB model: target collection and indexes
#[derive(Debug, Clone, Default)]
pub struct MongoSchema {
    collection: Option<String>,
    indexes: Vec<(Document, Option<IndexOptions>)>,
}

impl MongoSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the collection name derived from the model name
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    pub fn index(mut self, keys: Document, options: Option<IndexOptions>) -> Self {
        self.indexes.push((keys, options));
        self
    }
}

/// A schema bound to a name on a connection
#[derive(Debug, Clone)]
pub struct MongoModel {
    name: String,
    collection_name: String,
    indexes: Arc<Vec<(Document, Option<IndexOptions>)>>,
    connection: MongoConnection,
}

impl MongoModel {
    pub fn model_name(&self) -> &str {
        &self.name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    /// Untyped collection handle
    pub async fn collection(&self) -> Result<Collection<Document>, DriverError> {
        self.typed_collection::<Document>().await
    }

    pub async fn typed_collection<T>(&self) -> Result<Collection<T>, DriverError>
    where
        T: Send + Sync,
    {
        let database = self.connection.database().await?;
        Ok(database.collection::<T>(&self.collection_name))
    }

    /// Create the schema's indexes; a no-op when it declares none
    pub async fn sync_indexes(&self) -> Result<(), DriverError> {
        if self.indexes.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = self
            .indexes
            .iter()
            .map(|(keys, options)| {
                IndexModel::builder()
                    .keys(keys.clone())
                    .options(options.clone())
                    .build()
            })
            .collect();

        self.collection()
            .await?
            .create_indexes(indices)
            .await
            .map_err(|err| DriverError::with_context("Failed to create indexes", err))?;

        debug!(model = %self.name, "Indexes synchronised");
        Ok(())
    }
}

impl Driver for MongoDriver {
    type Connection = MongoConnection;
    type Schema = MongoSchema;
    type Model = MongoModel;

    fn name(&self) -> &str {
        "mongodb"
    }

    fn create_connection(
        &self,
        uri: &str,
        options: &DriverOptions,
        events: DriverEvents,
    ) -> Result<MongoConnection, DriverError> {
        let target = connection_string(uri, options)?;
        let connection = MongoConnection::pending(self.default_database.clone(), events);

        let task = connection.clone();
        tokio::spawn(async move { task.establish(target).await });

        Ok(connection)
    }

    fn model(&self, connection: &MongoConnection, name: &str, schema: MongoSchema) -> MongoModel {
        let collection_name = schema
            .collection
            .unwrap_or_else(|| default_collection_name(name));
        debug!(
            model = %name,
            collection = %collection_name,
            indexes = schema.indexes.len(),
            "Binding model"
        );
        MongoModel {
            name: name.to_string(),
            collection_name,
            indexes: Arc::new(schema.indexes),
            connection: connection.clone(),
        }
    }

    fn close<'a>(&'a self, connection: &'a MongoConnection) -> BoxFuture<'a, (), DriverError> {
        Box::pin(async move {
            connection.shutdown().await;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(pairs: &[(&str, Value)]) -> DriverOptions {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_connection_string_adds_slash_before_options() {
        let target =
            connection_string("mongodb://localhost:27017", &options(&[("appName", json!("docbridge"))]))
                .unwrap();
        assert_eq!(target, "mongodb://localhost:27017/?appName=docbridge");
    }

    #[test]
    fn test_connection_string_with_database() {
        let target = connection_string(
            "mongodb://localhost:27017/test",
            &options(&[("appName", json!("docbridge")), ("maxPoolSize", json!(5))]),
        )
        .unwrap();
        assert_eq!(
            target,
            "mongodb://localhost:27017/test?appName=docbridge&maxPoolSize=5"
        );
    }

    #[test]
    fn test_connection_string_keeps_explicit_query_values() {
        let target = connection_string(
            "mongodb://localhost:27017/test?appname=blog",
            &options(&[("appName", json!("docbridge")), ("retryWrites", json!(false))]),
        )
        .unwrap();
        assert_eq!(
            target,
            "mongodb://localhost:27017/test?appname=blog&retryWrites=false"
        );
    }

    #[test]
    fn test_connection_string_never_repeats_an_option() {
        let target = connection_string(
            "mongodb://localhost:27017/test",
            &options(&[("appName", json!("blog")), ("appname", json!("fromenv"))]),
        )
        .unwrap();
        assert_eq!(target, "mongodb://localhost:27017/test?appname=fromenv");
    }

    #[tokio::test]
    async fn test_lowercase_caller_option_parses() {
        let merged = crate::driver::merge_options(options(&[("appname", json!("blog"))]));

        let target = connection_string("mongodb://localhost:27017/test", &merged).unwrap();
        assert_eq!(target, "mongodb://localhost:27017/test?appname=blog");

        let parsed = ClientOptions::parse(&target).await.unwrap();
        assert_eq!(parsed.app_name.as_deref(), Some("blog"));
    }

    #[test]
    fn test_connection_string_encodes_values() {
        let target = connection_string(
            "mongodb://localhost:27017/test",
            &options(&[("appName", json!("my app"))]),
        )
        .unwrap();
        assert_eq!(target, "mongodb://localhost:27017/test?appName=my+app");
    }

    #[test]
    fn test_default_collection_name() {
        assert_eq!(default_collection_name("Post"), "posts");
        assert_eq!(default_collection_name("Category"), "categories");
        assert_eq!(default_collection_name("Day"), "days");
        assert_eq!(default_collection_name("Box"), "boxes");
        assert_eq!(default_collection_name("News"), "news");
    }

    #[tokio::test]
    async fn test_model_binds_before_connect() {
        let (events, _rx) = DriverEvents::channel();
        let connection = MongoConnection::pending(DEFAULT_DATABASE.to_string(), events);

        let model = MongoDriver::new().model(&connection, "Post", MongoSchema::new());
        assert_eq!(model.model_name(), "Post");
        assert_eq!(model.collection_name(), "posts");

        let custom = MongoDriver::new().model(
            &connection,
            "Comment",
            MongoSchema::new().collection("post_comments"),
        );
        assert_eq!(custom.collection_name(), "post_comments");
    }

    #[tokio::test]
    async fn test_close_before_connect_reports_close_once() {
        let (events, mut rx) = DriverEvents::channel();
        let connection = MongoConnection::pending(DEFAULT_DATABASE.to_string(), events);
        let driver = MongoDriver::new();

        driver.close(&connection).await.unwrap();
        driver.close(&connection).await.unwrap();

        assert_eq!(rx.recv().await, Some(crate::driver::DriverEvent::Close));
        assert!(rx.try_recv().is_err());
        assert!(connection.client().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_finishing_after_close_is_discarded() {
        let (events, mut rx) = DriverEvents::channel();
        let connection = MongoConnection::pending(DEFAULT_DATABASE.to_string(), events);
        let driver = MongoDriver::new();
        driver.close(&connection).await.unwrap();

        // the client is built lazily, no server is contacted
        let options = ClientOptions::parse("mongodb://localhost:27017").await.unwrap();
        let client = Client::with_options(options).unwrap();
        connection.finish_connect(Ok(client)).await;

        assert_eq!(rx.recv().await, Some(crate::driver::DriverEvent::Close));
        assert!(rx.try_recv().is_err());
        assert!(!connection.is_connected());
        assert!(connection.client().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_error_after_close_is_not_reported() {
        let (events, mut rx) = DriverEvents::channel();
        let connection = MongoConnection::pending(DEFAULT_DATABASE.to_string(), events);
        MongoDriver::new().close(&connection).await.unwrap();

        connection
            .finish_connect(Err(DriverError::new("server selection timeout")))
            .await;

        assert_eq!(rx.recv().await, Some(crate::driver::DriverEvent::Close));
        assert!(rx.try_recv().is_err());
    }
}
