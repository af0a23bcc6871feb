//! [`Connector`] backed by the worker process.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::WorkerClient;
use super::error::WorkerError;
use crate::backend::Connector;
use crate::config::{ConnectionParams, Driver};
use crate::error::{ExplorerError, ExplorerResult};
use crate::expansion::ValidFor;
use crate::tree::NodeKind;

/// Connection option that overrides whether system objects are listed.
pub const INCLUDE_SYSTEM_OBJECTS_OPTION: &str = "include_system_objects";

/// A worker-side database connection.
pub struct WorkerConnection {
    client: Arc<WorkerClient>,
    connection_id: String,
    server_name: Option<String>,
    server_major_version: Option<u32>,
    is_cloud: bool,
}

impl WorkerConnection {
    pub fn client(&self) -> &WorkerClient {
        &self.client
    }

    /// Worker-issued handle sent with every request.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn server_major_version(&self) -> Option<u32> {
        self.server_major_version
    }

    pub fn is_cloud(&self) -> bool {
        self.is_cloud
    }
}

/// Opens connections through a shared worker process.
#[derive(Clone)]
pub struct WorkerConnector {
    client: Arc<WorkerClient>,
}

impl WorkerConnector {
    pub fn new(client: Arc<WorkerClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<WorkerClient> {
        &self.client
    }
}

#[async_trait]
impl Connector for WorkerConnector {
    type Connection = WorkerConnection;

    async fn connect(&self, params: &ConnectionParams) -> ExplorerResult<WorkerConnection> {
        if !self.client.is_alive() {
            return Err(ExplorerError::Worker(WorkerError::WorkerExited));
        }

        let response = self
            .client
            .connect(params.driver.as_str(), &params.to_connection_string())
            .await
            .map_err(|e| ExplorerError::connect(&params.server, e.to_string()))?;

        tracing::debug!(
            server = %params.server,
            connection_id = %response.connection_id,
            version = ?response.server_major_version,
            "worker connection opened"
        );

        Ok(WorkerConnection {
            client: self.client.clone(),
            connection_id: response.connection_id,
            server_name: response.server_name,
            server_major_version: response.server_major_version,
            is_cloud: response.is_cloud,
        })
    }

    async fn disconnect(&self, connection: &WorkerConnection) {
        if let Err(e) = self.client.disconnect(&connection.connection_id).await {
            tracing::warn!(
                connection_id = %connection.connection_id,
                error = %e,
                "worker disconnect failed"
            );
        }
    }

    fn platform(&self, params: &ConnectionParams, connection: &WorkerConnection) -> ValidFor {
        match (params.driver, connection.is_cloud, connection.server_major_version) {
            (Driver::MsSql, true, _) => ValidFor::AZURE_SQL,
            (Driver::MsSql, false, Some(major)) => ValidFor::sql_server_version(major),
            (driver, _, _) => driver.default_platform(),
        }
    }

    fn include_system_objects(&self, params: &ConnectionParams, _kind: NodeKind) -> bool {
        match params.options.get(INCLUDE_SYSTEM_OBJECTS_OPTION) {
            Some(value) => matches!(value.to_ascii_lowercase().as_str(), "true" | "1" | "yes"),
            None => params.driver != Driver::Kusto,
        }
    }
}

impl std::fmt::Debug for WorkerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerConnection")
            .field("connection_id", &self.connection_id)
            .field("server_name", &self.server_name)
            .field("server_major_version", &self.server_major_version)
            .field("is_cloud", &self.is_cloud)
            .finish()
    }
}
