//! Crate-level error type.
//!
//! Not-found conditions (unknown session, unresolved path, unknown find kind)
//! are deliberately absent: those surface as empty results.

use std::time::Duration;

use thiserror::Error;

use crate::config::SettingsError;
use crate::expansion::StrategyError;
use crate::worker::WorkerError;

/// Result type for explorer operations.
pub type ExplorerResult<T> = Result<T, ExplorerError>;

/// Errors produced by session orchestration.
#[derive(Error, Debug)]
pub enum ExplorerError {
    /// A bounded operation exceeded its deadline.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// What was being waited for.
        operation: &'static str,
        /// The bound that was exceeded.
        timeout: Duration,
    },

    /// The backend connection could not be established.
    #[error("failed to connect to {server}: {message}")]
    Connect {
        /// Server the connection was opened against.
        server: String,
        /// Underlying failure text.
        message: String,
    },

    /// The connection slot queue was closed by session teardown.
    #[error("connection has been released")]
    ConnectionClosed,

    /// The session was closed while the operation was running.
    #[error("session {0} was closed")]
    SessionClosed(String),

    /// An expansion strategy failed.
    #[error(transparent)]
    Strategy(#[from] StrategyError),

    /// Worker transport failure.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Configuration failure.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Session id derivation failed.
    #[error("failed to serialize connection parameters: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A spawned orchestration task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),
}

impl ExplorerError {
    /// Create a timeout error.
    pub fn timeout(operation: &'static str, timeout: Duration) -> Self {
        Self::Timeout { operation, timeout }
    }

    /// Create a connect error.
    pub fn connect(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a deadline failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
            || matches!(self, Self::Worker(WorkerError::Timeout(_)))
    }

    /// Check if retrying the same operation could succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Worker(err) => err.is_retriable(),
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for ExplorerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
