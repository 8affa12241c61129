//! Values published into the axum application after registration
//!
//! axum keys shared state by type, so the connector, its driver and its
//! connection each become their own `Extension`. [`ConnectorHandle`] is the
//! driver-agnostic view used by the status routes and by shutdown code that
//! does not want to name the driver type.

use axum::extract::FromRef;
use axum::{Extension, Router};
use docbridge_db::{BoxFuture, Connector, ConnectorError, Driver, LifecycleState};
use std::fmt;
use std::sync::Arc;

/// What a successful registration hands back to the application
pub struct Exposed<D: Driver> {
    pub driver: Arc<D>,
    pub connection: D::Connection,
    pub connector: Arc<Connector<D>>,
}

impl<D: Driver> Exposed<D> {
    pub fn new(connector: Arc<Connector<D>>) -> Self {
        Self {
            driver: connector.driver().clone(),
            connection: connector.connection().clone(),
            connector,
        }
    }

    pub fn handle(&self) -> ConnectorHandle {
        ConnectorHandle::new(self.connector.clone())
    }

    /// Publish the driver, connection, connector and handle as extensions on `router`
    pub fn attach<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(Extension(self.handle()))
            .layer(Extension(self.connector.clone()))
            .layer(Extension(self.connection.clone()))
            .layer(Extension(self.driver.clone()))
    }
}

impl<D: Driver> Clone for Exposed<D> {
    fn clone(&self) -> Self {
        Self {
            driver: self.driver.clone(),
            connection: self.connection.clone(),
            connector: self.connector.clone(),
        }
    }
}

impl<D: Driver> fmt::Debug for Exposed<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exposed")
            .field("connector", &self.connector)
            .finish()
    }
}

impl<D: Driver> FromRef<Exposed<D>> for Arc<Connector<D>> {
    fn from_ref(exposed: &Exposed<D>) -> Self {
        exposed.connector.clone()
    }
}

impl<D: Driver> FromRef<Exposed<D>> for ConnectorHandle {
    fn from_ref(exposed: &Exposed<D>) -> Self {
        exposed.handle()
    }
}

trait ConnectorView: Send + Sync {
    fn driver_name(&self) -> &str;
    fn uri(&self) -> &str;
    fn state(&self) -> LifecycleState;
    fn model_names(&self) -> Vec<String>;
    fn require_model(&self, name: &str) -> Result<(), ConnectorError>;
    fn close(&self) -> BoxFuture<'_, (), ConnectorError>;
}

impl<D: Driver> ConnectorView for Connector<D> {
    fn driver_name(&self) -> &str {
        self.driver().name()
    }

    fn uri(&self) -> &str {
        Connector::uri(self)
    }

    fn state(&self) -> LifecycleState {
        Connector::state(self)
    }

    fn model_names(&self) -> Vec<String> {
        Connector::model_names(self)
    }

    fn require_model(&self, name: &str) -> Result<(), ConnectorError> {
        self.get_model(name).map(|_| ())
    }

    fn close(&self) -> BoxFuture<'_, (), ConnectorError> {
        Box::pin(Connector::close(self))
    }
}

/// Type-erased handle on a registered connector
#[derive(Clone)]
pub struct ConnectorHandle {
    inner: Arc<dyn ConnectorView>,
}

impl ConnectorHandle {
    pub fn new<D: Driver>(connector: Arc<Connector<D>>) -> Self {
        Self { inner: connector }
    }

    pub fn driver_name(&self) -> &str {
        self.inner.driver_name()
    }

    pub fn uri(&self) -> &str {
        self.inner.uri()
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn model_names(&self) -> Vec<String> {
        self.inner.model_names()
    }

    /// Fails with [`ConnectorError::ModelNotFound`] if `name` is not registered
    pub fn require_model(&self, name: &str) -> Result<(), ConnectorError> {
        self.inner.require_model(name)
    }

    pub async fn close(&self) -> Result<(), ConnectorError> {
        self.inner.close().await
    }
}

impl fmt::Debug for ConnectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorHandle")
            .field("driver", &self.driver_name())
            .field("uri", &self.uri())
            .field("state", &self.state())
            .finish()
    }
}
