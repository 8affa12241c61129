use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub mod models;
pub use models::*;

/// Marker value replaced by an environment variable named after its config path.
pub const SECRET_MARKER: &str = "secret_from_env";

/// Loads the application configuration.
///
/// Sources, later ones winning:
/// 1. `{config_dir}/default` (any format the `config` crate understands)
/// 2. `{config_dir}/{RUN_ENV}` (`RUN_ENV` defaults to `debug`)
/// 3. environment variables prefixed with `PREFIX` (default `DOCBRIDGE`), `__` as separator
///
/// `config_dir` is taken from `DOCBRIDGE_CONFIG_DIR` and falls back to `./config`.
/// Values equal to `"secret_from_env"` are then resolved from the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let config_dir = env::var("DOCBRIDGE_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"));

    load_config_from(&config_dir, &run_env)
}

/// Loads the configuration from an explicit directory and run environment.
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, ConfigError> {
    let prefix = env::var("PREFIX").unwrap_or_else(|_| "DOCBRIDGE".to_string());

    let default_path = config_dir.join("default");
    let env_path = config_dir.join(run_env);

    debug!("config: default_path: {}", default_path.display());
    debug!("config: env_path: {}", env_path.display());

    let builder = Config::builder()
        .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_path.to_string_lossy()).required(false))
        .add_source(Environment::with_prefix(&prefix).separator("__"));

    let raw_config: AppConfig = builder.build()?.try_deserialize()?;
    apply_env_overrides_from_marker(raw_config)
}

/// Recursively replaces all "secret_from_env" string values with environment variable values
fn inject_env_secrets(value: &mut Value) {
    fn walk(path: Vec<String>, obj: &mut Value) {
        match obj {
            Value::Object(map) => {
                for (k, v) in map.iter_mut() {
                    let mut new_path = path.clone();
                    new_path.push(k.to_string());
                    walk(new_path, v);
                }
            }
            Value::String(s) if s == SECRET_MARKER => {
                let env_key = path.join("_").to_uppercase();
                if let Ok(env_val) = env::var(&env_key) {
                    *obj = Value::String(env_val);
                } else {
                    warn!("env var {} not found for {}", env_key, SECRET_MARKER);
                }
            }
            _ => {}
        }
    }

    walk(vec![], value);
}

/// Applies environment overrides based on "secret_from_env" markers in serialized config
pub fn apply_env_overrides_from_marker(config: AppConfig) -> Result<AppConfig, ConfigError> {
    let mut json = serde_json::to_value(&config)
        .map_err(|err| ConfigError::Message(format!("failed to serialize config: {err}")))?;
    inject_env_secrets(&mut json);
    serde_json::from_value(json)
        .map_err(|err| ConfigError::Message(format!("failed to rebuild config: {err}")))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// The file is `DOTENV_OVERRIDE` when set, otherwise the first command line
/// argument if it starts with `.env`, otherwise `.env`. Loading happens once
/// per process; the chosen path is returned.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path_override = env::var("DOTENV_OVERRIDE").ok();
    let dotenv_path_arg = env::args().nth(1).filter(|s| s.starts_with(".env"));

    let dotenv_path = dotenv_path_override
        .or(dotenv_path_arg)
        .unwrap_or_else(|| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("docbridge-config-{}-{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_secret_marker_is_resolved_from_env() {
        env::set_var("DATABASE_URI", "mongodb://secret-host:27017/app");

        let config = AppConfig {
            database: Some(DatabaseConfig {
                uri: SECRET_MARKER.to_string(),
                ..Default::default()
            }),
            ..Default::default()
        };

        let resolved = apply_env_overrides_from_marker(config).unwrap();
        assert_eq!(
            resolved.database.unwrap().uri,
            "mongodb://secret-host:27017/app"
        );
    }

    #[test]
    fn test_unresolved_marker_is_left_in_place() {
        let mut value = serde_json::json!({ "missing": { "key": SECRET_MARKER } });
        inject_env_secrets(&mut value);
        assert_eq!(value["missing"]["key"], SECRET_MARKER);
    }

    #[test]
    fn test_load_config_layers_default_and_run_env() {
        let dir = scratch_dir("layers");
        fs::write(
            dir.join("default.toml"),
            r#"
[server]
host = "0.0.0.0"
port = 3000

[database]
uri = "mongodb://localhost:27017/test"
ready_timeout_secs = 5

[database.options]
maxPoolSize = 4
"#,
        )
        .unwrap();
        fs::write(
            dir.join("staging.toml"),
            r#"
[server]
host = "0.0.0.0"
port = 4000
"#,
        )
        .unwrap();

        let config = load_config_from(&dir, "staging").unwrap();
        assert_eq!(config.server.port, 4000);

        let database = config.database.unwrap();
        assert_eq!(database.uri, "mongodb://localhost:27017/test");
        assert_eq!(database.ready_timeout_secs, Some(5));
        assert!(database.log_events);
        // key casing is left to the config crate
        assert_eq!(database.options.len(), 1);
        assert_eq!(database.options.values().next(), Some(&serde_json::json!(4)));
    }

    #[test]
    fn test_missing_files_fall_back_to_defaults() {
        let dir = scratch_dir("empty");
        let config = load_config_from(&dir, "nowhere").unwrap();
        assert_eq!(config.server, ServerConfig::default());
    }
}
