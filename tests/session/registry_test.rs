// tests/session/registry_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::{labels, params, MemoryConnector, ScriptedStrategy};
use object_explorer::expansion::{FolderStrategy, StrategyRegistry};
use object_explorer::session::{ExplorerEvent, SessionRegistry, SessionState};
use object_explorer::tree::{ChildDescriptor, NodeKind};
use object_explorer::ExplorerError;

fn server_folders() -> FolderStrategy {
    FolderStrategy::new(NodeKind::Server).folder(NodeKind::DatabasesFolder, 0)
}

#[tokio::test]
async fn test_root_node_is_server() {
    let registry = SessionRegistry::builder(MemoryConnector::new()).build();

    let created = registry.create_session(params()).await.unwrap();
    assert!(!created.reused);
    assert_eq!(created.root_node.node_path, "srv");
    assert_eq!(created.root_node.node_type, "Server");
    assert_eq!(created.root_node.label, "srv");
    assert!(!created.root_node.is_leaf);

    let session = registry.session(&created.session_id).unwrap();
    assert_eq!(session.state(), SessionState::Active);
}

#[tokio::test]
async fn test_expand_root_lists_folders() {
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(server_folders()))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let response = registry.expand(&created.session_id, "srv", false).await;
    assert_eq!(response.node_path, "srv");
    assert_eq!(labels(&response.nodes), vec!["Databases"]);
    assert_eq!(response.nodes[0].node_path, "srv/Databases");
    assert_eq!(response.nodes[0].node_type, "Folder");
    assert!(response.error_message.is_none());
}

#[tokio::test]
async fn test_partial_failure_reports_children_and_error() {
    let strategies = StrategyRegistry::new()
        .with(
            FolderStrategy::new(NodeKind::Database)
                .folder(NodeKind::TablesFolder, 0)
                .folder(NodeKind::ViewsFolder, 1),
        )
        .with(ScriptedStrategy::new("extras", NodeKind::Database).failing("access denied"));
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(
            strategies.with(
                ScriptedStrategy::new("databases", NodeKind::Server)
                    .child(ChildDescriptor::new(NodeKind::Database, "sales")),
            ),
        )
        .build();
    let created = registry.create_session(params()).await.unwrap();

    registry.expand(&created.session_id, "srv", false).await;
    let response = registry.expand(&created.session_id, "srv/sales", false).await;

    assert_eq!(labels(&response.nodes), vec!["Tables", "Views"]);
    assert_eq!(response.error_message.as_deref(), Some("access denied"));

    let session = registry.session(&created.session_id).unwrap();
    assert_eq!(session.last_error().as_deref(), Some("access denied"));
}

#[tokio::test]
async fn test_unknown_session_and_path_are_empty() {
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(server_folders()))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let unknown_session = registry.expand("no-such-session", "srv", false).await;
    assert!(unknown_session.is_empty());
    assert!(unknown_session.error_message.is_none());

    // Never populated, so it is not addressable yet.
    let unknown_path = registry
        .expand(&created.session_id, "srv/Databases/sales", false)
        .await;
    assert!(unknown_path.is_empty());
    assert!(unknown_path.error_message.is_none());

    let refreshed = registry.refresh("no-such-session", "srv").await;
    assert!(refreshed.is_empty());
}

#[tokio::test]
async fn test_expand_reuses_children_until_refresh() {
    let tables = ScriptedStrategy::new("databases", NodeKind::Server)
        .child(ChildDescriptor::new(NodeKind::Database, "sales"));
    let stats = tables.stats.clone();
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(tables))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let first = registry.expand(&created.session_id, "srv", false).await;
    let second = registry.expand(&created.session_id, "srv", false).await;
    assert_eq!(first, second);
    assert_eq!(stats.calls(), 1);

    let refreshed = registry.refresh(&created.session_id, "srv").await;
    assert_eq!(labels(&refreshed.nodes), vec!["sales"]);
    assert_eq!(stats.calls(), 2);
}

#[tokio::test]
async fn test_expand_leaf_is_empty() {
    let strategies = StrategyRegistry::new().with(
        ScriptedStrategy::new("columns", NodeKind::Server)
            .child(ChildDescriptor::new(NodeKind::Column, "id")),
    );
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(strategies)
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let response = registry.expand(&created.session_id, "srv", false).await;
    assert!(response.nodes[0].is_leaf);

    let leaf = registry.expand(&created.session_id, "srv/id", false).await;
    assert!(leaf.is_empty());
    assert!(leaf.error_message.is_none());
}

#[tokio::test]
async fn test_create_reuses_active_session() {
    let connector = MemoryConnector::new();
    let stats = connector.stats.clone();
    let registry = SessionRegistry::builder(connector).build();

    let first = registry.create_session(params()).await.unwrap();
    let second = registry.create_session(params()).await.unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert!(second.reused);
    assert_eq!(stats.connects(), 1);
    assert_eq!(registry.len(), 1);

    let other = registry
        .create_session(params().with_database("inventory"))
        .await
        .unwrap();
    assert_ne!(other.session_id, first.session_id);
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_password_does_not_split_sessions() {
    let registry = SessionRegistry::builder(MemoryConnector::new()).build();

    let a = registry
        .create_session(params().with_credentials("app", "one"))
        .await
        .unwrap();
    let b = registry
        .create_session(params().with_credentials("app", "two"))
        .await
        .unwrap();
    assert_eq!(a.session_id, b.session_id);
    assert!(b.reused);
}

#[tokio::test]
async fn test_connect_failure_never_registers() {
    let (registry, mut events) = SessionRegistry::builder(MemoryConnector::failing("login failed"))
        .build_with_events();

    let err = registry.create_session(params()).await.unwrap_err();
    assert!(matches!(err, ExplorerError::Connect { .. }));
    assert!(err.to_string().contains("login failed"));
    assert!(registry.is_empty());

    match events.recv().await.unwrap() {
        ExplorerEvent::SessionCreated {
            success,
            root_node,
            error_message,
            ..
        } => {
            assert!(!success);
            assert!(root_node.is_none());
            assert!(error_message.unwrap().contains("login failed"));
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_timeout_still_registers_late_session() {
    let connector = MemoryConnector::new().with_delay(Duration::from_millis(200));
    let stats = connector.stats.clone();
    let registry = SessionRegistry::builder(connector)
        .create_session_timeout(Duration::from_millis(20))
        .build();

    let err = registry.create_session(params()).await.unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(registry.len(), 1);

    let again = registry.create_session(params()).await.unwrap();
    assert!(again.reused);
    assert_eq!(stats.connects(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_keep_one_connection() {
    let connector = MemoryConnector::new().with_delay(Duration::from_millis(50));
    let stats = connector.stats.clone();
    let registry = SessionRegistry::builder(connector).build();

    let (a, b) = tokio::join!(
        registry.create_session(params()),
        registry.create_session(params())
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.session_id, b.session_id);
    assert!(a.reused != b.reused);
    assert_eq!(registry.len(), 1);
    assert_eq!(stats.connects() - stats.disconnects(), 1);
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let connector = MemoryConnector::new();
    let stats = connector.stats.clone();
    let (registry, mut events) = SessionRegistry::builder(connector)
        .strategies(StrategyRegistry::new().with(server_folders()))
        .build_with_events();
    let created = registry.create_session(params()).await.unwrap();
    let session = registry.session(&created.session_id).unwrap();

    assert!(registry.close_session(&created.session_id).await);
    assert!(registry.close_session(&created.session_id).await);
    assert!(registry.close_session("never-existed").await);

    assert_eq!(stats.disconnects(), 1);
    assert!(registry.is_empty());
    assert_eq!(session.state(), SessionState::Removed);
    assert!(session.binding().is_closed());

    let after = registry.expand(&created.session_id, "srv", false).await;
    assert!(after.is_empty());

    assert!(matches!(
        events.recv().await,
        Some(ExplorerEvent::SessionCreated { success: true, .. })
    ));
    assert_eq!(
        events.recv().await,
        Some(ExplorerEvent::SessionClosed {
            session_id: created.session_id.clone()
        })
    );
}

#[tokio::test]
async fn test_expand_emits_completion_event() {
    let (registry, mut events) = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(server_folders()))
        .build_with_events();
    let created = registry.create_session(params()).await.unwrap();
    let response = registry.expand(&created.session_id, "srv", false).await;

    let _created_event = events.recv().await;
    assert_eq!(
        events.recv().await,
        Some(ExplorerEvent::ExpandCompleted(response))
    );
}

#[tokio::test]
async fn test_shutdown_closes_everything() {
    let connector = MemoryConnector::new();
    let stats = connector.stats.clone();
    let registry = SessionRegistry::builder(connector).build();

    registry.create_session(params()).await.unwrap();
    registry
        .create_session(params().with_database("inventory"))
        .await
        .unwrap();

    registry.shutdown().await;
    assert!(registry.is_empty());
    assert_eq!(stats.disconnects(), 2);
}
