use docbridge_db::{Connector, Driver};
use tracing::{error, info, warn};

use crate::error::RegisterError;
use crate::options::PluginOptions;
use crate::state::Exposed;

/// Connect `driver` and bind the schemas once the database is ready.
///
/// Resolves after the first connection outcome. On success every schema in
/// `options.schemas` is registered as a model and the connector is returned
/// for the application to publish with [`Exposed::attach`]. Nothing is
/// returned on failure, so a failed registration never leaves a half-set-up
/// connector in the application state.
///
/// # Errors
///
/// * [`RegisterError::Connector`] for a missing or empty uri
/// * [`RegisterError::Connection`] with the driver's error if connecting fails
/// * [`RegisterError::Timeout`] if `ready_timeout` is set and elapses first;
///   the connector is closed before returning
pub async fn register<D: Driver>(
    driver: D,
    options: PluginOptions<D::Schema>,
) -> Result<Exposed<D>, RegisterError> {
    let (connector_options, schemas, ready_timeout) = options.into_parts();
    let connector = Connector::new(driver, connector_options)?;

    let outcome = match ready_timeout {
        Some(limit) => match tokio::time::timeout(limit, connector.wait_ready()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(uri = %connector.uri(), ?limit, "Database not ready in time");
                if let Err(err) = connector.close().await {
                    error!(error = %err, "Failed to close connector after timeout");
                }
                return Err(RegisterError::Timeout(limit));
            }
        },
        None => connector.wait_ready().await,
    };
    if let Err(err) = outcome {
        error!(uri = %connector.uri(), error = %err, "Database registration failed");
        return Err(err.into());
    }

    let count = schemas.len();
    connector.set_models(schemas);
    info!(
        driver = connector.driver().name(),
        models = count,
        "Database registered"
    );

    Ok(Exposed::new(connector))
}
