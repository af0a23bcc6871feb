//! Expansion strategies served by the worker.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::connector::WorkerConnection;
use super::protocol::ListChildrenParams;
use crate::expansion::{
    ExpandRequest, ExpansionStrategy, FolderStrategy, NodeFilter, PropertyFilter, StrategyError,
    StrategyRegistry, ValidFor,
};
use crate::tree::{ChildDescriptor, NodeKind};

/// Asks the worker for children of given kinds under given parents.
#[derive(Debug, Clone)]
pub struct WorkerStrategy {
    name: String,
    parents: Vec<NodeKind>,
    child_kinds: Vec<NodeKind>,
    filters: Vec<NodeFilter>,
}

impl WorkerStrategy {
    pub fn new(name: impl Into<String>, parent: NodeKind, child: NodeKind) -> Self {
        Self {
            name: name.into(),
            parents: vec![parent],
            child_kinds: vec![child],
            filters: Vec::new(),
        }
    }

    pub fn and_parent(mut self, parent: NodeKind) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn filter(mut self, filter: impl Into<NodeFilter>) -> Self {
        self.filters.push(filter.into());
        self
    }
}

#[async_trait]
impl ExpansionStrategy<WorkerConnection> for WorkerStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_parents(&self) -> &[NodeKind] {
        &self.parents
    }

    fn filters(&self) -> &[NodeFilter] {
        &self.filters
    }

    async fn expand(
        &self,
        request: ExpandRequest<'_>,
        connection: &WorkerConnection,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChildDescriptor>, StrategyError> {
        if !self.parents.contains(&request.parent.kind) {
            return Err(StrategyError::UnsupportedParent {
                strategy: self.name.clone(),
                kind: request.parent.kind,
            });
        }

        let params = ListChildrenParams {
            connection_id: connection.connection_id(),
            parent: request.parent,
            child_kinds: &self.child_kinds,
            refresh: request.refresh,
            name_filter: request.name_filter,
            include_system_objects: request.include_system_objects,
            filters: request.filters,
        };
        let response = match connection.client().list_children(params, cancel).await {
            Ok(response) => response,
            Err(err) if err.is_worker_exited() => {
                tracing::error!(strategy = %self.name, "worker is gone, expansion cannot proceed");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let (children, unexpected): (Vec<_>, Vec<_>) = response
            .children
            .into_iter()
            .partition(|child| self.child_kinds.contains(&child.kind));
        if !unexpected.is_empty() {
            tracing::debug!(
                strategy = %self.name,
                dropped = unexpected.len(),
                "worker returned children of unrequested kinds"
            );
        }

        Ok(children)
    }
}

fn user_objects() -> PropertyFilter {
    PropertyFilter::equals("is_system_object", false)
}

fn system_objects() -> PropertyFilter {
    PropertyFilter::equals("is_system_object", true)
}

/// The standard server hierarchy:
///
/// ```text
/// Server
/// └─ Databases
///    ├─ System Databases ─ <database> ...
///    └─ <database>
///       ├─ Tables
///       │  ├─ System Tables ─ <table> ...
///       │  └─ <table> ─ Columns ─ <column>
///       ├─ Views ─ <view> ─ Columns ─ <column>
///       └─ Functions ─ <function> ─ Columns ─ <column>
/// ```
pub fn default_strategies() -> StrategyRegistry<WorkerConnection> {
    StrategyRegistry::new()
        .with(FolderStrategy::new(NodeKind::Server).folder(NodeKind::DatabasesFolder, 0))
        .with(
            FolderStrategy::new(NodeKind::DatabasesFolder)
                .system_folder(NodeKind::SystemDatabasesFolder, 0),
        )
        .with(
            WorkerStrategy::new("databases", NodeKind::DatabasesFolder, NodeKind::Database)
                .filter(user_objects()),
        )
        .with(
            WorkerStrategy::new(
                "system_databases",
                NodeKind::SystemDatabasesFolder,
                NodeKind::Database,
            )
            .filter(system_objects()),
        )
        .with(
            FolderStrategy::new(NodeKind::Database)
                .folder(NodeKind::TablesFolder, 0)
                .folder(NodeKind::ViewsFolder, 1)
                .folder(NodeKind::FunctionsFolder, 2),
        )
        .with(
            FolderStrategy::new(NodeKind::TablesFolder)
                .system_folder(NodeKind::SystemTablesFolder, 0),
        )
        .with(
            WorkerStrategy::new("tables", NodeKind::TablesFolder, NodeKind::Table)
                .filter(user_objects())
                // Ledger history tables are listed under their ledger table.
                .filter(
                    PropertyFilter::not_equals("ledger_type", 1)
                        .valid_for(ValidFor::SQL_SERVER_2022 | ValidFor::AZURE_SQL),
                )
                .filter(
                    PropertyFilter::not_equals("temporal_type", 1)
                        .valid_for(ValidFor::ALL_SQL_SERVER),
                ),
        )
        .with(
            WorkerStrategy::new("system_tables", NodeKind::SystemTablesFolder, NodeKind::Table)
                .filter(system_objects()),
        )
        .with(
            WorkerStrategy::new("views", NodeKind::ViewsFolder, NodeKind::View)
                .filter(user_objects()),
        )
        .with(WorkerStrategy::new(
            "functions",
            NodeKind::FunctionsFolder,
            NodeKind::Function,
        ))
        .with(
            FolderStrategy::new(NodeKind::Table)
                .and_parent(NodeKind::View)
                .and_parent(NodeKind::Function)
                .folder(NodeKind::ColumnsFolder, 0),
        )
        .with(WorkerStrategy::new(
            "columns",
            NodeKind::ColumnsFolder,
            NodeKind::Column,
        ))
}
