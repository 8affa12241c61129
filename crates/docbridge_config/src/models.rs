// --- File: crates/docbridge_config/src/models.rs ---

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// --- General Server Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

// --- Database Config ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct DatabaseConfig {
    /// Connection target, e.g. `mongodb://localhost:27017/app`.
    /// Loaded via DOCBRIDGE_DATABASE__URI or the `secret_from_env` marker (DATABASE_URI).
    #[serde(default)]
    pub uri: String,

    /// Driver options merged over the connector defaults.
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub options: BTreeMap<String, Value>,

    /// Upper bound for the registration wait. Unset waits until the driver reports.
    #[serde(default)]
    pub ready_timeout_secs: Option<u64>,

    /// Forward connector lifecycle lines to the tracing log.
    #[serde(default = "default_true")]
    pub log_events: bool,
}

fn default_true() -> bool {
    true
}

// --- Unified App Configuration ---
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct AppConfig {
    // Server config is mandatory in files, defaulted for tests
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}
