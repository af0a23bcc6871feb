// tests/session/find_test.rs
#[path = "../common/mod.rs"]
mod common;

use common::{params, MemoryConnector, ScriptedStrategy};
use object_explorer::backend::{FindNodesRequest, TemplatePathGenerator};
use object_explorer::config::FindSettings;
use object_explorer::expansion::{FolderStrategy, StrategyRegistry};
use object_explorer::session::SessionRegistry;
use object_explorer::tree::{ChildDescriptor, NodeKind, ObjectMetadata};

fn table(schema: &str, name: &str) -> ChildDescriptor {
    ChildDescriptor::object(
        NodeKind::Table,
        ObjectMetadata::new("Table", name).with_schema(schema),
    )
}

fn column(name: &str) -> ChildDescriptor {
    ChildDescriptor::new(NodeKind::Column, name)
}

struct Fixture {
    registry: SessionRegistry<MemoryConnector>,
    session_id: String,
    user_databases: ScriptedStrategy,
}

/// A server with one user database and one system database:
///
/// ```text
/// srv
/// └─ Databases
///    ├─ System Databases ─ master ─ Tables ─ System Tables ─ sys.objects
///    └─ sales ─ Tables ─ dbo.orders ─ Columns ─ id
/// ```
async fn fixture() -> Fixture {
    let user_databases = ScriptedStrategy::new("databases", NodeKind::DatabasesFolder)
        .child(ChildDescriptor::new(NodeKind::Database, "sales"));
    let strategies = StrategyRegistry::new()
        .with(FolderStrategy::new(NodeKind::Server).folder(NodeKind::DatabasesFolder, 0))
        .with(
            FolderStrategy::new(NodeKind::DatabasesFolder)
                .system_folder(NodeKind::SystemDatabasesFolder, 0),
        )
        .with(user_databases.clone())
        .with(
            ScriptedStrategy::new("system_databases", NodeKind::SystemDatabasesFolder)
                .child(ChildDescriptor::new(NodeKind::Database, "master")),
        )
        .with(FolderStrategy::new(NodeKind::Database).folder(NodeKind::TablesFolder, 0))
        .with(
            FolderStrategy::new(NodeKind::TablesFolder)
                .system_folder(NodeKind::SystemTablesFolder, 0),
        )
        .with(ScriptedStrategy::new("tables", NodeKind::TablesFolder).child(table("dbo", "orders")))
        .with(
            ScriptedStrategy::new("system_tables", NodeKind::SystemTablesFolder)
                .child(table("sys", "objects")),
        )
        .with(FolderStrategy::new(NodeKind::Table).folder(NodeKind::ColumnsFolder, 0))
        .with(ScriptedStrategy::new("columns", NodeKind::ColumnsFolder).child(column("id")));

    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(strategies)
        .build();
    let created = registry.create_session(params()).await.unwrap();

    Fixture {
        registry,
        session_id: created.session_id,
        user_databases,
    }
}

#[tokio::test]
async fn test_find_system_table_matches_once() {
    let f = fixture().await;
    let request = FindNodesRequest::new(&f.session_id, "Table")
        .with_database("master")
        .with_schema("sys")
        .with_name("objects");

    let found = f.registry.find_nodes(&request).await;

    assert_eq!(found.len(), 1);
    assert_eq!(
        found[0].node_path,
        "srv/Databases/System Databases/master/Tables/System Tables/sys.objects"
    );
    assert_eq!(found[0].node_type, "Table");
    // The user database list was needed to rule out the other candidates,
    // but the user database itself never was.
    assert_eq!(f.user_databases.stats.calls(), 1);
}

#[tokio::test]
async fn test_find_user_table_and_column() {
    let f = fixture().await;

    let tables = f
        .registry
        .find_nodes(
            &FindNodesRequest::new(&f.session_id, "table")
                .with_database("sales")
                .with_schema("dbo")
                .with_name("orders"),
        )
        .await;
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].node_path, "srv/Databases/sales/Tables/dbo.orders");

    let columns = f
        .registry
        .find_nodes(
            &FindNodesRequest::new(&f.session_id, "Column")
                .with_database("sales")
                .with_schema("dbo")
                .with_parent("orders")
                .with_name("id"),
        )
        .await;
    assert_eq!(columns.len(), 1);
    assert_eq!(
        columns[0].node_path,
        "srv/Databases/sales/Tables/dbo.orders/Columns/id"
    );
    assert!(columns[0].is_leaf);
}

#[tokio::test]
async fn test_find_populated_nodes_are_expandable() {
    let f = fixture().await;
    f.registry
        .find_nodes(&FindNodesRequest::new(&f.session_id, "Database").with_database("sales"))
        .await;

    // find populated the ancestors, so the path is now addressable.
    let response = f
        .registry
        .expand(&f.session_id, "srv/Databases/sales", false)
        .await;
    assert_eq!(response.nodes.len(), 1);
    assert_eq!(response.nodes[0].label, "Tables");
}

#[tokio::test]
async fn test_find_nothing() {
    let f = fixture().await;

    let unknown_kind = FindNodesRequest::new(&f.session_id, "StoredProcedure").with_name("x");
    assert!(f.registry.find_nodes(&unknown_kind).await.is_empty());

    let unknown_session = FindNodesRequest::new("no-such-session", "Table")
        .with_database("sales")
        .with_schema("dbo")
        .with_name("orders");
    assert!(f.registry.find_nodes(&unknown_session).await.is_empty());

    let missing = FindNodesRequest::new(&f.session_id, "Table")
        .with_database("sales")
        .with_schema("dbo")
        .with_name("missing");
    assert!(f.registry.find_nodes(&missing).await.is_empty());

    // No database given, so no template can be rendered.
    let underspecified = FindNodesRequest::new(&f.session_id, "Table").with_name("orders");
    assert!(f.registry.find_nodes(&underspecified).await.is_empty());
}

#[tokio::test]
async fn test_configured_templates_replace_defaults() {
    let settings = FindSettings {
        templates: [(
            "table".to_string(),
            vec!["Databases/{database}/Tables/{object}".to_string()],
        )]
        .into_iter()
        .collect(),
        replace_defaults: true,
    };

    let strategies = StrategyRegistry::new()
        .with(FolderStrategy::new(NodeKind::Server).folder(NodeKind::DatabasesFolder, 0))
        .with(
            ScriptedStrategy::new("databases", NodeKind::DatabasesFolder)
                .child(ChildDescriptor::new(NodeKind::Database, "sales")),
        )
        .with(FolderStrategy::new(NodeKind::Database).folder(NodeKind::TablesFolder, 0))
        .with(ScriptedStrategy::new("tables", NodeKind::TablesFolder).child(table("dbo", "orders")));
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(strategies)
        .candidates(TemplatePathGenerator::from_settings(&settings))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let views = registry
        .find_nodes(
            &FindNodesRequest::new(&created.session_id, "View")
                .with_database("sales")
                .with_name("v"),
        )
        .await;
    assert!(views.is_empty());

    let tables = registry
        .find_nodes(
            &FindNodesRequest::new(&created.session_id, "Table")
                .with_database("sales")
                .with_schema("dbo")
                .with_name("orders"),
        )
        .await;
    assert_eq!(tables.len(), 1);
}
