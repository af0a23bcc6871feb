// tests/tree/population_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::ScriptedStrategy;
use object_explorer::expansion::{
    ExpandRequest, ExpansionStrategy, FolderStrategy, NodeFilter, PopulateContext, PropertyFilter,
    StrategyError, StrategyRegistry, ValidFor,
};
use object_explorer::tree::{ChildDescriptor, NodeKind, PopulationState, TreeNode};
use tokio_util::sync::CancellationToken;

fn ctx(strategies: &StrategyRegistry<()>, platform: ValidFor, system: bool) -> PopulateContext<'_, ()> {
    PopulateContext {
        strategies,
        connection: &(),
        platform,
        include_system_objects: system,
    }
}

fn values(nodes: &[Arc<TreeNode>]) -> Vec<String> {
    nodes.iter().map(|n| n.value().to_string()).collect()
}

fn tables_folder() -> Arc<TreeNode> {
    let db = TreeNode::from_descriptor(ChildDescriptor::new(NodeKind::Database, "sales"));
    let folder = TreeNode::from_descriptor(ChildDescriptor::folder(NodeKind::TablesFolder));
    db.add_child(folder.clone());
    folder
}

/// Records the filters and flags each request carried.
#[derive(Default)]
struct RecordingStrategy {
    seen: Mutex<Vec<(Vec<NodeFilter>, bool)>>,
    filters: Vec<NodeFilter>,
}

#[async_trait]
impl ExpansionStrategy<()> for RecordingStrategy {
    fn name(&self) -> &str {
        "recording"
    }

    fn supported_parents(&self) -> &[NodeKind] {
        &[NodeKind::TablesFolder]
    }

    fn filters(&self) -> &[NodeFilter] {
        &self.filters
    }

    async fn expand(
        &self,
        request: ExpandRequest<'_>,
        _connection: &(),
        _cancel: &CancellationToken,
    ) -> Result<Vec<ChildDescriptor>, StrategyError> {
        self.seen
            .lock()
            .unwrap()
            .push((request.filters.to_vec(), request.include_system_objects));
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_refresh_replaces_children() {
    let strategy = ScriptedStrategy::new("tables", NodeKind::TablesFolder)
        .child(ChildDescriptor::new(NodeKind::Table, "dbo.orders"));
    let stats = strategy.stats.clone();
    let strategies = StrategyRegistry::new().with(strategy);
    let folder = tables_folder();
    let cancel = CancellationToken::new();
    let ctx = ctx(&strategies, ValidFor::SQL_SERVER_2022, true);

    let first = folder.expand(&ctx, None, &cancel).await;
    let again = folder.expand(&ctx, None, &cancel).await;
    assert_eq!(stats.calls(), 1);
    assert!(Arc::ptr_eq(&first[0], &again[0]));

    let refreshed = folder.refresh(&ctx, None, &cancel).await;
    assert_eq!(stats.calls(), 2);
    assert_eq!(values(&refreshed), vec!["dbo.orders"]);
    assert!(!Arc::ptr_eq(&first[0], &refreshed[0]));
    assert!(first[0].parent().is_none());
    assert_eq!(refreshed[0].path(), "sales/Tables/dbo.orders");
}

#[tokio::test]
async fn test_failed_strategy_keeps_other_results() {
    let strategies = StrategyRegistry::new()
        .with(FolderStrategy::new(NodeKind::TablesFolder).system_folder(NodeKind::SystemTablesFolder, 0))
        .with(ScriptedStrategy::new("tables", NodeKind::TablesFolder).failing("permission denied"));
    let folder = tables_folder();
    let cancel = CancellationToken::new();
    let ctx = ctx(&strategies, ValidFor::SQL_SERVER_2022, true);

    let children = folder.expand(&ctx, None, &cancel).await;
    assert_eq!(values(&children), vec!["System Tables"]);
    assert_eq!(folder.error_message().as_deref(), Some("permission denied"));
    assert_eq!(folder.child_state(), PopulationState::Initialized);
}

#[tokio::test]
async fn test_refresh_clears_previous_error() {
    let failing = StrategyRegistry::new()
        .with(ScriptedStrategy::new("tables", NodeKind::TablesFolder).failing("boom"));
    let healthy = StrategyRegistry::new().with(
        ScriptedStrategy::new("tables", NodeKind::TablesFolder)
            .child(ChildDescriptor::new(NodeKind::Table, "dbo.orders")),
    );
    let folder = tables_folder();
    let cancel = CancellationToken::new();

    folder
        .expand(&ctx(&failing, ValidFor::ALL, true), None, &cancel)
        .await;
    assert!(folder.error_message().is_some());

    let children = folder
        .refresh(&ctx(&healthy, ValidFor::ALL, true), None, &cancel)
        .await;
    assert_eq!(children.len(), 1);
    assert!(folder.error_message().is_none());
}

#[tokio::test]
async fn test_name_filter_spares_folders() {
    let strategies = StrategyRegistry::new()
        .with(FolderStrategy::new(NodeKind::TablesFolder).system_folder(NodeKind::SystemTablesFolder, 0))
        .with(
            ScriptedStrategy::new("tables", NodeKind::TablesFolder)
                .child(ChildDescriptor::new(NodeKind::Table, "dbo.Orders"))
                .child(ChildDescriptor::new(NodeKind::Table, "dbo.customers")),
        );
    let folder = tables_folder();
    let cancel = CancellationToken::new();
    let ctx = ctx(&strategies, ValidFor::ALL, true);

    let filtered = folder.expand(&ctx, Some("ORD"), &cancel).await;
    assert_eq!(values(&filtered), vec!["System Tables", "dbo.Orders"]);

    // Filtered children are never reused for an unfiltered request.
    assert!(!folder.has_reusable_children(None));
    let all = folder.expand(&ctx, None, &cancel).await;
    assert_eq!(values(&all), vec!["System Tables", "dbo.customers", "dbo.Orders"]);
    assert!(folder.has_reusable_children(None));
}

#[tokio::test]
async fn test_filters_narrowed_to_platform() {
    let strategy = Arc::new(RecordingStrategy {
        seen: Mutex::new(Vec::new()),
        filters: vec![
            PropertyFilter::equals("is_system_object", false).into(),
            PropertyFilter::not_equals("ledger_type", 1)
                .valid_for(ValidFor::SQL_SERVER_2022)
                .into(),
        ],
    });
    let mut strategies = StrategyRegistry::new();
    strategies.register_shared(strategy.clone());
    let cancel = CancellationToken::new();

    tables_folder()
        .expand(&ctx(&strategies, ValidFor::SQL_SERVER_2022, true), None, &cancel)
        .await;
    tables_folder()
        .expand(&ctx(&strategies, ValidFor::POSTGRES, false), None, &cancel)
        .await;

    let seen = strategy.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].0.len(), 2);
    assert!(seen[0].1);
    assert_eq!(seen[1].0.len(), 1);
    assert!(!seen[1].1);
}

#[tokio::test]
async fn test_cancel_mid_population_commits_partial() {
    let strategies = StrategyRegistry::new()
        .with(FolderStrategy::new(NodeKind::TablesFolder).system_folder(NodeKind::SystemTablesFolder, 0))
        .with(
            ScriptedStrategy::new("tables", NodeKind::TablesFolder)
                .child(ChildDescriptor::new(NodeKind::Table, "dbo.orders"))
                .with_delay(std::time::Duration::from_secs(30)),
        );
    let folder = tables_folder();
    let cancel = CancellationToken::new();
    let ctx = ctx(&strategies, ValidFor::ALL, true);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let children = folder.expand(&ctx, None, &cancel).await;
    assert_eq!(values(&children), vec!["System Tables"]);
    assert!(folder.error_message().is_none());
}
