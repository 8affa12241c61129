//! axum integration for docbridge
//!
//! [`register`] connects a driver, waits for the first outcome and binds the
//! configured schemas. The returned [`Exposed`] publishes the driver, the
//! connection and the connector into an axum router, and [`routes`] adds a
//! small status API on top.
//!
//! ```rust,no_run
//! use axum::Router;
//! use docbridge_axum::{register, routes, PluginOptions};
//! use docbridge_db::{MemoryDriver, MemorySchema};
//!
//! # async fn run() -> Result<(), docbridge_axum::RegisterError> {
//! let options = PluginOptions::new("memory://blog")
//!     .with_schema("Post", MemorySchema::new(["title", "content"]));
//! let exposed = register(MemoryDriver::new(), options).await?;
//!
//! let app = exposed.attach(Router::new().merge(routes(exposed.handle())));
//! # let _ = app;
//! # Ok(())
//! # }
//! ```

pub mod doc;
pub mod error;
pub mod handlers;
pub mod options;
pub mod plugin;
pub mod routes;
pub mod state;

#[cfg(feature = "openapi")]
pub use doc::DbApiDoc;
pub use error::RegisterError;
pub use options::PluginOptions;
pub use plugin::register;
pub use routes::routes;
pub use state::{ConnectorHandle, Exposed};
