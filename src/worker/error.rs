//! Worker transport errors.

use std::io;
use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Failures talking to the metadata worker, plus the worker-reported error
/// codes the explorer distinguishes.
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("worker binary not found; set worker.path in the config file")]
    NotFound,

    #[error("failed to spawn worker process: {0}")]
    SpawnFailed(#[source] io::Error),

    #[error("failed to write to worker: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("failed to encode worker request: {0}")]
    SerializeFailed(#[source] serde_json::Error),

    #[error("failed to decode worker response: {0}")]
    DeserializeFailed(#[source] serde_json::Error),

    /// No response within the client's request timeout.
    #[error("worker request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller's cancellation token fired first.
    #[error("worker request cancelled")]
    Cancelled,

    #[error("worker process exited unexpectedly")]
    WorkerExited,

    /// The reader task dropped the response channel.
    #[error("worker response channel closed")]
    ChannelClosed,

    /// Error code the explorer does not classify.
    #[error("worker error: {message} (code: {code})")]
    Remote { code: String, message: String },

    #[error("database driver not found: {0}")]
    DriverNotFound(String),

    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// The connection handle was closed or never issued.
    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    #[error("invalid worker request: {0}")]
    InvalidRequest(String),

    #[error("worker method not found: {0}")]
    MethodNotFound(String),
}

impl WorkerError {
    /// Map an error code from a failed response envelope.
    pub fn from_code(code: &str, message: &str) -> Self {
        let message = message.to_string();
        match code {
            "DRIVER_NOT_FOUND" => Self::DriverNotFound(message),
            "CONNECTION_FAILED" => Self::ConnectionFailed(message),
            "UNKNOWN_CONNECTION" => Self::UnknownConnection(message),
            "INVALID_REQUEST" => Self::InvalidRequest(message),
            "METHOD_NOT_FOUND" => Self::MethodNotFound(message),
            "WORKER_EXITED" => Self::WorkerExited,
            _ => Self::Remote {
                code: code.to_string(),
                message,
            },
        }
    }

    /// Whether the worker process is gone and every later request will fail.
    pub fn is_worker_exited(&self) -> bool {
        matches!(self, Self::WorkerExited | Self::ChannelClosed)
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Cancelled)
    }
}
