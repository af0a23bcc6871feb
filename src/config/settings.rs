//! TOML-based configuration.
//!
//! Supports a config file (explorer.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [connections.production]
//! driver = "mssql"
//! server = "sql.internal"
//! database = "sales"
//! user = "${PROD_DB_USER}"
//! password = "${PROD_DB_PASSWORD}"
//!
//! [connections.dev]
//! driver = "duckdb"
//! server = "./data/dev.duckdb"
//!
//! [worker]
//! path = "./explorer-worker"
//! request_timeout_secs = 30
//!
//! [explorer]
//! create_session_timeout_secs = 45
//! expand_timeout_secs = 45
//!
//! [find.templates]
//! table = ["Databases/{database}/Tables/{object}"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::connection::{ConnectionParams, Driver};

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("Unsupported driver: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named database connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Worker configuration.
    pub worker: WorkerSettings,

    /// Session and expansion bounds.
    pub explorer: ExplorerSettings,

    /// Find-node path templates.
    pub find: FindSettings,
}

/// Connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Database driver (mssql, postgres, duckdb, kusto).
    pub driver: String,

    /// Server hostname or file path (supports ${ENV_VAR} expansion).
    pub server: String,

    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,

    /// Username (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub user: Option<String>,

    /// Password (supports ${ENV_VAR} expansion).
    #[serde(default)]
    pub password: Option<String>,

    /// Driver-specific options.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl ConnectionSettings {
    /// Get the driver type.
    pub fn driver_type(&self) -> Result<Driver, SettingsError> {
        Driver::from_str(&self.driver)
            .map_err(|_| SettingsError::UnsupportedDriver(self.driver.clone()))
    }

    /// Resolve into connection parameters, expanding environment variables.
    pub fn to_params(&self) -> Result<ConnectionParams, SettingsError> {
        let expand_opt = |value: &Option<String>| -> Result<Option<String>, SettingsError> {
            value.as_deref().map(expand_env_vars).transpose()
        };

        Ok(ConnectionParams {
            driver: self.driver_type()?,
            server: expand_env_vars(&self.server)?,
            database: expand_opt(&self.database)?,
            port: self.port,
            user: expand_opt(&self.user)?,
            password: expand_opt(&self.password)?,
            options: self
                .options
                .iter()
                .map(|(k, v)| Ok((k.clone(), expand_env_vars(v)?)))
                .collect::<Result<_, SettingsError>>()?,
        })
    }
}

/// Worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Path to the worker binary.
    pub path: Option<String>,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            path: None,
            request_timeout_secs: 30,
        }
    }
}

impl WorkerSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Session and expansion bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExplorerSettings {
    /// Bound on connecting and building a session.
    pub create_session_timeout_secs: u64,

    /// Bound on node lock, connection slot and population for one expand.
    pub expand_timeout_secs: u64,

    /// Bound on waiting for in-flight expansions when closing a session.
    pub close_timeout_secs: u64,
}

impl Default for ExplorerSettings {
    fn default() -> Self {
        Self {
            create_session_timeout_secs: 45,
            expand_timeout_secs: 45,
            close_timeout_secs: 10,
        }
    }
}

impl ExplorerSettings {
    pub fn create_session_timeout(&self) -> Duration {
        Duration::from_secs(self.create_session_timeout_secs)
    }

    pub fn expand_timeout(&self) -> Duration {
        Duration::from_secs(self.expand_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

/// Find-node settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FindSettings {
    /// Extra path templates per kind, tried after the built-in ones.
    pub templates: HashMap<String, Vec<String>>,

    /// Replace the built-in templates instead of extending them.
    pub replace_defaults: bool,
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `OBJECT_EXPLORER_CONFIG`
    /// 2. `./explorer.toml`
    /// 3. `~/.config/object-explorer/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("OBJECT_EXPLORER_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("explorer.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("object-explorer").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Get a connection by name.
    pub fn get_connection(&self, name: &str) -> Result<&ConnectionSettings, SettingsError> {
        self.connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))
    }

    /// Get the worker binary path.
    ///
    /// Returns the configured path, or searches common locations and `PATH`.
    pub fn worker_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.worker.path {
            let expanded = expand_env_vars(path).ok()?;
            return Some(PathBuf::from(expanded));
        }

        let candidates = ["explorer-worker", "./explorer-worker", "./worker/explorer-worker"];
        for candidate in candidates {
            let path = PathBuf::from(candidate);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(output) = std::process::Command::new("which")
            .arg("explorer-worker")
            .output()
        {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    return Some(PathBuf::from(path));
                }
            }
        }

        None
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if !(ch.is_alphanumeric() || ch == '_') {
                    break;
                }
                var_name.push(ch);
                chars.next();
            }
            if var_name.is_empty() {
                // Lone `$`
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
