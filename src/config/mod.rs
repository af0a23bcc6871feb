//! Configuration module.
//!
//! Handles connection parameters, environment variables, and settings.

mod connection;
mod settings;

pub use connection::{ConnectionError, ConnectionParams, Driver};
pub use settings::{
    expand_env_vars, ConnectionSettings, ExplorerSettings, FindSettings, Settings, SettingsError,
    WorkerSettings,
};
