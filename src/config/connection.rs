//! Database connection parameters.
//!
//! Supports configuration via environment variables:
//! - `EXPLORER_DB_DRIVER`: Database driver (mssql, postgres, duckdb, kusto)
//! - `EXPLORER_DB_SERVER`: Server hostname (or file path for DuckDB)
//! - `EXPLORER_DB_NAME`: Database name (optional)
//! - `EXPLORER_DB_PORT`: Port (optional, uses driver default)
//! - `EXPLORER_DB_USER` / `EXPLORER_DB_PASSWORD`: Credentials (optional)

use std::collections::BTreeMap;
use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::expansion::ValidFor;

/// Error type for connection configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Unsupported driver: {0}. Supported: mssql, postgres, duckdb, kusto")]
    UnsupportedDriver(String),
}

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Microsoft SQL Server / Azure SQL
    MsSql,
    /// PostgreSQL
    Postgres,
    /// DuckDB (file or in-memory)
    DuckDb,
    /// Azure Data Explorer
    Kusto,
}

impl Driver {
    /// Parse driver from string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConnectionError> {
        match s.to_lowercase().as_str() {
            "mssql" | "sqlserver" | "sql_server" => Ok(Driver::MsSql),
            "postgres" | "postgresql" | "pg" => Ok(Driver::Postgres),
            "duckdb" | "duck" => Ok(Driver::DuckDb),
            "kusto" | "adx" => Ok(Driver::Kusto),
            other => Err(ConnectionError::UnsupportedDriver(other.to_string())),
        }
    }

    /// Get the driver name for the worker.
    pub fn as_str(&self) -> &'static str {
        match self {
            Driver::MsSql => "mssql",
            Driver::Postgres => "postgres",
            Driver::DuckDb => "duckdb",
            Driver::Kusto => "kusto",
        }
    }

    /// Get the default port for this driver.
    pub fn default_port(&self) -> u16 {
        match self {
            Driver::MsSql => 1433,
            Driver::Postgres => 5432,
            Driver::Kusto => 443,
            Driver::DuckDb => 0, // Not applicable
        }
    }

    /// Platform assumed before the server reports its version.
    pub fn default_platform(&self) -> ValidFor {
        match self {
            Driver::MsSql => ValidFor::SQL_SERVER_2022,
            Driver::Postgres => ValidFor::POSTGRES,
            Driver::DuckDb => ValidFor::DUCKDB,
            Driver::Kusto => ValidFor::KUSTO,
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters a session is created from.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Database driver.
    pub driver: Driver,
    /// Server hostname.
    pub server: String,
    /// Database name.
    #[serde(default)]
    pub database: Option<String>,
    /// Port (optional).
    #[serde(default)]
    pub port: Option<u16>,
    /// Username (absent means integrated authentication).
    #[serde(default)]
    pub user: Option<String>,
    /// Password.
    #[serde(default)]
    pub password: Option<String>,
    /// Driver-specific options.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("options", &self.options)
            .finish()
    }
}

impl ConnectionParams {
    pub fn new(driver: Driver, server: impl Into<String>) -> Self {
        Self {
            driver,
            server: server.into(),
            database: None,
            port: None,
            user: None,
            password: None,
            options: BTreeMap::new(),
        }
    }

    /// SQL Server with integrated authentication.
    pub fn mssql_trusted(server: impl Into<String>, database: impl Into<String>) -> Self {
        Self::new(Driver::MsSql, server).with_database(database)
    }

    /// DuckDB file (or `:memory:`).
    pub fn duckdb(path: impl Into<String>) -> Self {
        Self::new(Driver::DuckDb, path)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Load parameters from environment variables.
    pub fn from_env() -> Result<Self, ConnectionError> {
        let driver_str = env::var("EXPLORER_DB_DRIVER")
            .map_err(|_| ConnectionError::MissingEnvVar("EXPLORER_DB_DRIVER".to_string()))?;
        let driver = Driver::from_str(&driver_str)?;

        let server = env::var("EXPLORER_DB_SERVER")
            .map_err(|_| ConnectionError::MissingEnvVar("EXPLORER_DB_SERVER".to_string()))?;

        Ok(Self {
            driver,
            server,
            database: env::var("EXPLORER_DB_NAME").ok(),
            port: env::var("EXPLORER_DB_PORT").ok().and_then(|p| p.parse().ok()),
            user: env::var("EXPLORER_DB_USER").ok(),
            password: env::var("EXPLORER_DB_PASSWORD").ok(),
            options: BTreeMap::new(),
        })
    }

    /// Build the driver connection string for the worker.
    pub fn to_connection_string(&self) -> String {
        match self.driver {
            Driver::MsSql => self.build_mssql_connection_string(),
            Driver::Postgres => self.build_postgres_connection_string(),
            Driver::DuckDb => self.build_duckdb_connection_string(),
            Driver::Kusto => self.build_kusto_connection_string(),
        }
    }

    fn build_mssql_connection_string(&self) -> String {
        let host = match self.port {
            Some(port) => format!("sqlserver://{}:{}", self.server, port),
            None => format!("sqlserver://{}", self.server),
        };

        let mut params = Vec::new();
        if let Some(database) = &self.database {
            params.push(format!("database={}", database));
        }
        match (&self.user, &self.password) {
            (Some(user), Some(pass)) => {
                params.push(format!("user id={}", user));
                params.push(format!("password={}", pass));
            }
            _ => params.push("trusted_connection=true".to_string()),
        }
        params.extend(self.options.iter().map(|(k, v)| format!("{}={}", k, v)));

        format!("{}?{}", host, params.join("&"))
    }

    fn build_postgres_connection_string(&self) -> String {
        let mut parts = vec![
            format!("host={}", self.server),
            format!("port={}", self.port.unwrap_or(self.driver.default_port())),
        ];
        if let Some(database) = &self.database {
            parts.push(format!("dbname={}", database));
        }
        if let Some(user) = &self.user {
            parts.push(format!("user={}", user));
        }
        if let Some(password) = &self.password {
            parts.push(format!("password={}", password));
        }
        parts.extend(self.options.iter().map(|(k, v)| format!("{}={}", k, v)));
        parts.join(" ")
    }

    fn build_duckdb_connection_string(&self) -> String {
        if self.server.is_empty() || self.server == ":memory:" {
            ":memory:".to_string()
        } else {
            self.server.clone()
        }
    }

    fn build_kusto_connection_string(&self) -> String {
        let mut parts = vec![format!("Data Source={}", self.server)];
        if let Some(database) = &self.database {
            parts.push(format!("Initial Catalog={}", database));
        }
        parts.extend(self.options.iter().map(|(k, v)| format!("{}={}", k, v)));
        parts.join(";")
    }
}
