use docbridge_db::{
    BoxFuture, Connector, ConnectorError, ConnectorEvent, ConnectorOptions, Driver, DriverError,
    DriverEvents, DriverOptions, LifecycleState, LogSink, MemoryConnection, MemoryDriver,
    MemoryModel, MemorySchema,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast::error::TryRecvError;

const URI: &str = "mongodb://localhost:27017/test";

// Helper: a sink that records every line
fn recording_sink() -> (Arc<dyn LogSink>, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let captured = lines.clone();
    let sink: Arc<dyn LogSink> =
        Arc::new(move |message: &str| captured.lock().unwrap().push(message.to_string()));
    (sink, lines)
}

fn post_schema() -> MemorySchema {
    MemorySchema::new(["title", "content", "createdAt"])
}

// Helper: a memory driver whose first close fails
struct FlakyCloseDriver {
    inner: MemoryDriver,
    fail_next_close: AtomicBool,
}

impl Driver for FlakyCloseDriver {
    type Connection = MemoryConnection;
    type Schema = MemorySchema;
    type Model = MemoryModel;

    fn name(&self) -> &str {
        "flaky"
    }

    fn create_connection(
        &self,
        uri: &str,
        options: &DriverOptions,
        events: DriverEvents,
    ) -> Result<MemoryConnection, DriverError> {
        self.inner.create_connection(uri, options, events)
    }

    fn model(&self, connection: &MemoryConnection, name: &str, schema: MemorySchema) -> MemoryModel {
        self.inner.model(connection, name, schema)
    }

    fn close<'a>(&'a self, connection: &'a MemoryConnection) -> BoxFuture<'a, (), DriverError> {
        if self.fail_next_close.swap(false, Ordering::SeqCst) {
            return Box::pin(async { Err(DriverError::new("socket busy")) });
        }
        self.inner.close(connection)
    }
}

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_missing_uri_fails_before_connecting() {
    let driver = Arc::new(MemoryDriver::new());

    let result = Connector::with_shared_driver(driver.clone(), ConnectorOptions::default());

    assert!(matches!(result, Err(ConnectorError::Config(_))));
    assert_eq!(driver.connection_attempts(), 0);
}

#[tokio::test]
async fn test_empty_uri_fails_before_connecting() {
    let driver = Arc::new(MemoryDriver::new());

    let result = Connector::with_shared_driver(driver.clone(), ConnectorOptions::new(""));

    match result {
        Err(ConnectorError::Config(message)) => assert_eq!(message, "uri is required"),
        other => panic!("expected a configuration error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(driver.connection_attempts(), 0);
}

#[test]
fn test_requires_a_runtime() {
    let result = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI));
    assert!(matches!(result, Err(ConnectorError::Runtime(_))));
}

#[tokio::test]
async fn test_returns_a_connector() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();

    assert_eq!(connector.uri(), URI);
    assert_eq!(connector.driver().connection_attempts(), 1);
    assert_eq!(connector.connection().uri(), URI);
}

#[tokio::test]
async fn test_returns_a_connector_with_a_sink() {
    let connector = Connector::new(
        MemoryDriver::new(),
        ConnectorOptions::new(URI).with_sink(|message: &str| {
            let _ = message.len();
        }),
    )
    .unwrap();

    assert_eq!(connector.uri(), URI);
}

#[tokio::test]
async fn test_ready_event_fires_once() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();
    // current-thread runtime: the relay has not run yet
    let mut events = connector.subscribe();

    assert_eq!(
        events.recv().await.unwrap(),
        ConnectorEvent::Ready("✔ Connected to mongodb://localhost:27017/test".to_string())
    );
    assert_eq!(
        events.recv().await.unwrap(),
        ConnectorEvent::Open("Connection to database opened".to_string())
    );

    settle().await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_close_event_after_ready() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();
    connector.wait_ready().await.unwrap();
    settle().await;

    let mut events = connector.subscribe();
    connector.close().await.unwrap();
    connector.close().await.unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        ConnectorEvent::Close("Connection to database closed".to_string())
    );
    settle().await;
    assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
    assert_eq!(connector.state(), LifecycleState::Closed);
    assert!(connector.is_closed());
    assert!(connector.connection().is_closed());
}

#[tokio::test]
async fn test_initializes_the_schemas() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();
    connector.wait_ready().await.unwrap();

    connector.set_models([("Post", post_schema())]);

    assert_eq!(connector.models().len(), 1);
    assert!(connector.has_model("Post"));
}

#[tokio::test]
async fn test_get_model_that_does_not_exist() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();
    connector.wait_ready().await.unwrap();
    connector.set_models([("Post", post_schema())]);

    let err = connector.get_model("Comment").unwrap_err();

    assert_eq!(err, ConnectorError::ModelNotFound("Comment".to_string()));
    assert_eq!(err.to_string(), "Model 'Comment' does not exist");
}

#[tokio::test]
async fn test_returns_a_model() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();
    connector.wait_ready().await.unwrap();
    connector.set_models([("Post", post_schema())]);

    let model = connector.get_model("Post").unwrap();

    assert_eq!(model.model_name(), "Post");
    assert_eq!(model.fields(), ["title", "content", "createdAt"]);
}

#[tokio::test]
async fn test_set_models_overwrites_same_name() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();

    connector.set_models([("Post", post_schema())]);
    connector.set_models([("Post", MemorySchema::new(["title"]))]);

    assert_eq!(connector.model_names(), vec!["Post".to_string()]);
    assert_eq!(connector.get_model("Post").unwrap().fields(), ["title"]);
}

#[tokio::test]
async fn test_models_can_be_bound_before_ready() {
    let connector = Connector::new(MemoryDriver::holding(), ConnectorOptions::new(URI)).unwrap();

    connector.set_models([("Post", post_schema()), ("Comment", MemorySchema::default())]);

    assert_eq!(
        connector.model_names(),
        vec!["Comment".to_string(), "Post".to_string()]
    );
    assert_eq!(connector.state(), LifecycleState::Connecting);
}

#[tokio::test]
async fn test_wait_ready_rejects_on_connection_error() {
    let (sink, lines) = recording_sink();
    let connector = Connector::new(
        MemoryDriver::failing("connect ECONNREFUSED 127.0.0.1:27017"),
        ConnectorOptions::new(URI).with_shared_sink(sink),
    )
    .unwrap();

    let err = connector.wait_ready().await.unwrap_err();

    assert_eq!(
        err,
        ConnectorError::Connection(DriverError::new("connect ECONNREFUSED 127.0.0.1:27017"))
    );
    assert!(matches!(connector.state(), LifecycleState::Failed(_)));
    assert_eq!(
        *lines.lock().unwrap(),
        vec!["Unable to connect to database: connect ECONNREFUSED 127.0.0.1:27017".to_string()]
    );
}

#[tokio::test]
async fn test_late_observer_still_sees_ready() {
    let connector = Connector::new(MemoryDriver::new(), ConnectorOptions::new(URI)).unwrap();
    connector.wait_ready().await.unwrap();
    settle().await;

    let state = connector.watch_state();
    assert_eq!(*state.borrow(), LifecycleState::Open);

    // a second wait after the fact resolves at once
    connector.wait_ready().await.unwrap();
}

#[tokio::test]
async fn test_close_while_waiting_does_not_resolve() {
    let (sink, lines) = recording_sink();
    let connector = Connector::new(
        MemoryDriver::holding(),
        ConnectorOptions::new(URI).with_shared_sink(sink),
    )
    .unwrap();

    let waiter = {
        let connector = connector.clone();
        tokio::spawn(async move { connector.wait_ready().await })
    };
    settle().await;

    connector.connection().close();
    settle().await;

    assert!(!waiter.is_finished());
    assert!(lines
        .lock()
        .unwrap()
        .contains(&"Connection to database closed".to_string()));

    connector.connection().reconnect();
    assert_eq!(waiter.await.unwrap(), Ok(()));
}

#[tokio::test]
async fn test_disconnect_and_reconnect_are_relayed() {
    let (sink, lines) = recording_sink();
    let connector = Connector::new(
        MemoryDriver::new(),
        ConnectorOptions::new(URI).with_shared_sink(sink),
    )
    .unwrap();
    connector.wait_ready().await.unwrap();
    settle().await;

    let mut events = connector.subscribe();
    connector.connection().disconnect();
    assert_eq!(
        events.recv().await.unwrap(),
        ConnectorEvent::Disconnected("Database disconnected".to_string())
    );
    assert_eq!(connector.state(), LifecycleState::Disconnected);

    connector.connection().reconnect();
    assert_eq!(events.recv().await.unwrap().name(), "ready");
    assert_eq!(connector.state(), LifecycleState::Ready);

    assert_eq!(
        *lines.lock().unwrap(),
        vec![
            "Connection to database ready".to_string(),
            "Connection to database disconnected".to_string(),
            "Connection to database ready".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_options_are_merged_over_default() {
    let connector = Connector::new(
        MemoryDriver::new(),
        ConnectorOptions::new(URI).with_option("maxPoolSize", 5),
    )
    .unwrap();

    let options = connector.connection().options();
    assert_eq!(options.get("appName"), Some(&json!("docbridge")));
    assert_eq!(options.get("maxPoolSize"), Some(&json!(5)));
    assert_eq!(connector.options(), options);
}

#[tokio::test]
async fn test_caller_overrides_default_option() {
    let connector = Connector::new(
        MemoryDriver::new(),
        ConnectorOptions::new(URI).with_option("appName", "blog"),
    )
    .unwrap();

    assert_eq!(
        connector.connection().options().get("appName"),
        Some(&json!("blog"))
    );
}

#[tokio::test]
async fn test_lowercase_caller_option_replaces_default() {
    let connector = Connector::new(
        MemoryDriver::new(),
        ConnectorOptions::new(URI).with_option("appname", "blog"),
    )
    .unwrap();

    let options = connector.connection().options();
    assert_eq!(options.get("appname"), Some(&json!("blog")));
    assert_eq!(options.get("appName"), None);
}

#[tokio::test]
async fn test_failed_close_can_be_retried() {
    let driver = FlakyCloseDriver {
        inner: MemoryDriver::new(),
        fail_next_close: AtomicBool::new(true),
    };
    let connector = Connector::new(driver, ConnectorOptions::new(URI)).unwrap();
    connector.wait_ready().await.unwrap();

    let err = connector.close().await.unwrap_err();
    assert_eq!(err, ConnectorError::Connection(DriverError::new("socket busy")));
    assert!(!connector.is_closed());
    assert!(!connector.connection().is_closed());

    connector.close().await.unwrap();
    assert!(connector.is_closed());
    assert!(connector.connection().is_closed());
}
