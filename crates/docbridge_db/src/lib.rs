//! Connection lifecycle wrapper for document databases
//!
//! This crate wraps one connection of an external database driver in a
//! [`Connector`]. The connector relays the driver's lifecycle notifications
//! under a small stable vocabulary and keeps a registry of models bound by
//! name. Everything else (wire protocol, queries, schema validation) stays
//! with the driver.
//!
//! # Features
//!
//! - `ready` / `error` / `open` / `close` / `disconnected` events over a broadcast channel
//! - latest lifecycle state over a watch channel, so late observers still see it
//! - model registry with overwrite-on-reregister semantics
//! - optional plain-text [`LogSink`] for the lifecycle lines
//! - MongoDB driver (`mongodb` feature, on by default) and an in-memory driver
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! docbridge-db = { version = "0.1.0" }
//! ```
//!
//! # Example
//!
//! ```rust
//! use docbridge_db::{Connector, ConnectorOptions, MemoryDriver, MemorySchema};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = Connector::new(
//!     MemoryDriver::new(),
//!     ConnectorOptions::new("memory://blog").with_sink(|line: &str| println!("{line}")),
//! )?;
//! connector.wait_ready().await?;
//!
//! connector.set_models([("Post", MemorySchema::new(["title", "content"]))]);
//! assert_eq!(connector.get_model("Post")?.model_name(), "Post");
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod driver;
pub mod error;
pub mod event;
pub mod memory;
#[cfg(feature = "mongodb")]
pub mod mongo;
pub mod sink;

// Re-export the connector, driver seam and events for ease of use
pub use connector::{Connector, ConnectorOptions};
pub use driver::{BoxFuture, Driver, DriverEvent, DriverEvents, DriverOptions};
pub use error::{ConnectorError, DriverError};
pub use event::{ConnectorEvent, LifecycleState};
pub use memory::{ConnectBehaviour, MemoryConnection, MemoryDriver, MemoryModel, MemorySchema};
#[cfg(feature = "mongodb")]
pub use mongo::{MongoConnection, MongoDriver, MongoModel, MongoSchema};
pub use sink::{LogSink, NoopSink, TracingSink};
