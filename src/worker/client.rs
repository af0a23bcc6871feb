//! Async client for communicating with the metadata worker process.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;

use super::error::{WorkerError, WorkerResult};
use super::protocol::{
    methods, ConnectParams, ConnectResponse, DisconnectParams, DisconnectResponse, ErrorInfo,
    ListChildrenParams, ListChildrenResponse, RequestEnvelope, ResponseEnvelope,
};
use crate::config::Settings;

/// Default timeout for requests (30 seconds).
const DEFAULT_TIMEOUT_SECS: u64 = 30;

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>;

/// Async client for the metadata worker.
///
/// The client spawns the worker as a child process and communicates via
/// NDJSON (newline-delimited JSON) over stdin/stdout. Each request has a
/// unique ID for correlation with responses, enabling concurrent requests
/// from many sessions over one process.
///
/// # Example
///
/// ```ignore
/// use object_explorer::worker::WorkerClient;
///
/// let client = WorkerClient::spawn("./explorer-worker").await?;
/// let connected = client.connect("duckdb", "./data.duckdb").await?;
/// ```
pub struct WorkerClient {
    /// Writer for sending requests to worker stdin.
    stdin: Arc<Mutex<BufWriter<ChildStdin>>>,

    /// Map of pending request IDs to response channels.
    pending: PendingMap,

    /// Handle to the worker child process.
    _child: Child,

    /// Handle to the background reader task.
    reader_task: tokio::task::JoinHandle<()>,

    /// Request timeout duration.
    timeout: Duration,
}

impl WorkerClient {
    /// Spawn a new worker process.
    pub async fn spawn<P: AsRef<Path>>(worker_path: P) -> WorkerResult<Self> {
        Self::spawn_with_timeout(worker_path, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Spawn the worker named by the settings, with the configured timeout.
    pub async fn spawn_with_settings(settings: &Settings) -> WorkerResult<Self> {
        let worker_path = settings.worker_path().ok_or(WorkerError::NotFound)?;
        tracing::debug!(path = %worker_path.display(), "spawning worker");
        Self::spawn_with_timeout(&worker_path, settings.worker.request_timeout()).await
    }

    /// Spawn a new worker process with a custom timeout.
    pub async fn spawn_with_timeout<P: AsRef<Path>>(
        worker_path: P,
        timeout: Duration,
    ) -> WorkerResult<Self> {
        let mut child = Command::new(worker_path.as_ref())
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(WorkerError::SpawnFailed)?;

        let stdin = child.stdin.take().ok_or_else(|| not_captured("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| not_captured("stdout"))?;

        let stdin = Arc::new(Mutex::new(BufWriter::new(stdin)));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let reader_task = Self::spawn_reader_task(stdout, pending.clone());

        Ok(Self {
            stdin,
            pending,
            _child: child,
            reader_task,
            timeout,
        })
    }

    /// Spawn the background task that reads responses from the worker.
    fn spawn_reader_task(stdout: ChildStdout, pending: PendingMap) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(stdout);
            let mut line = String::new();

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => break,
                    Ok(_) => match serde_json::from_str::<ResponseEnvelope>(&line) {
                        Ok(resp) => {
                            if let Some(tx) = pending.lock().await.remove(&resp.id) {
                                let _ = tx.send(resp);
                            } else {
                                tracing::debug!(id = %resp.id, "worker response for abandoned request");
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to parse worker response");
                        }
                    },
                    Err(e) => {
                        tracing::error!(error = %e, "worker read error");
                        break;
                    }
                }
            }

            // Worker exited - fail every pending request
            let mut pending = pending.lock().await;
            if !pending.is_empty() {
                tracing::warn!(pending = pending.len(), "worker exited with requests in flight");
            }
            for (id, tx) in pending.drain() {
                let _ = tx.send(ResponseEnvelope {
                    id,
                    success: false,
                    result: None,
                    error: Some(ErrorInfo {
                        code: "WORKER_EXITED".to_string(),
                        message: "Worker process exited unexpectedly".to_string(),
                    }),
                });
            }
        })
    }

    /// Send a request to the worker and wait for a response.
    pub async fn request<P, R>(&self, method: &str, params: P) -> WorkerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        self.request_cancellable(method, params, &CancellationToken::new())
            .await
    }

    /// Send a request, giving up when `cancel` fires or the timeout passes.
    ///
    /// An abandoned request is forgotten, including when this future is
    /// dropped mid-flight; a late response is dropped by the reader task.
    pub async fn request_cancellable<P, R>(
        &self,
        method: &str,
        params: P,
        cancel: &CancellationToken,
    ) -> WorkerResult<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = uuid::Uuid::new_v4().to_string();

        let request = RequestEnvelope {
            id: id.clone(),
            method: method.to_string(),
            params: serde_json::to_value(params).map_err(WorkerError::SerializeFailed)?,
        };

        // Register response channel
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);
        let _entry = PendingEntry::new(&self.pending, &id);

        // Send request
        let line = serde_json::to_string(&request).map_err(WorkerError::SerializeFailed)? + "\n";
        let written = {
            let mut stdin = self.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            return Err(WorkerError::WriteFailed(e));
        }

        tracing::trace!(id = %id, method, "worker request sent");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = tokio::time::timeout(self.timeout, rx) => Some(result),
        };

        let response = match outcome {
            Some(Ok(Ok(resp))) => resp,
            Some(Ok(Err(_))) => return Err(WorkerError::ChannelClosed),
            Some(Err(_)) => return Err(WorkerError::Timeout(self.timeout)),
            None => return Err(WorkerError::Cancelled),
        };

        if response.success {
            let result = response.result.unwrap_or(serde_json::Value::Null);
            serde_json::from_value(result).map_err(WorkerError::DeserializeFailed)
        } else {
            let error = response.error.unwrap_or_else(|| ErrorInfo {
                code: "UNKNOWN".to_string(),
                message: "Unknown error".to_string(),
            });
            Err(WorkerError::from_code(&error.code, &error.message))
        }
    }

    /// Returns `false` once the reader task has finished (worker exited).
    pub fn is_alive(&self) -> bool {
        !self.reader_task.is_finished()
    }

    /// Get the current request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

// Convenience methods for the explorer protocol
impl WorkerClient {
    /// Open a database connection inside the worker.
    pub async fn connect(&self, driver: &str, connection_string: &str) -> WorkerResult<ConnectResponse> {
        self.request(
            methods::CONNECT,
            ConnectParams {
                driver: driver.to_string(),
                connection_string: connection_string.to_string(),
            },
        )
        .await
    }

    /// Close a worker-side connection.
    pub async fn disconnect(&self, connection_id: &str) -> WorkerResult<DisconnectResponse> {
        self.request(
            methods::DISCONNECT,
            DisconnectParams {
                connection_id: connection_id.to_string(),
            },
        )
        .await
    }

    /// List the children of a node.
    pub async fn list_children(
        &self,
        params: ListChildrenParams<'_>,
        cancel: &CancellationToken,
    ) -> WorkerResult<ListChildrenResponse> {
        self.request_cancellable(methods::LIST_CHILDREN, params, cancel)
            .await
    }
}

/// Removes a request's response channel when the request ends, however it
/// ends. Already gone if the reader task delivered the response.
struct PendingEntry {
    pending: PendingMap,
    id: String,
}

impl PendingEntry {
    fn new(pending: &PendingMap, id: &str) -> Self {
        Self {
            pending: pending.clone(),
            id: id.to_string(),
        }
    }
}

impl Drop for PendingEntry {
    fn drop(&mut self) {
        if let Ok(mut pending) = self.pending.try_lock() {
            pending.remove(&self.id);
            return;
        }
        // Contended: finish the removal on the runtime.
        let pending = self.pending.clone();
        let id = std::mem::take(&mut self.id);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                pending.lock().await.remove(&id);
            });
        }
    }
}

fn not_captured(stream: &str) -> WorkerError {
    WorkerError::SpawnFailed(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("worker {} not captured", stream),
    ))
}
