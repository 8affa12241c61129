use axum::{routing::get, Router};
use tracing::info;

use crate::handlers::{model_handler, status_handler};
use crate::state::ConnectorHandle;

/// Database status routes for a registered connector.
///
/// The returned router has its state applied, so it merges into any
/// application router.
pub fn routes(handle: ConnectorHandle) -> Router {
    info!(driver = handle.driver_name(), "Database status routes initialized");

    Router::new()
        .route("/db/status", get(status_handler))
        .route("/db/models/{name}", get(model_handler))
        .with_state(handle)
}
