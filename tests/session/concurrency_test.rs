// tests/session/concurrency_test.rs
#[path = "../common/mod.rs"]
mod common;

use std::time::Duration;

use common::{labels, params, MemoryConnector, ScriptedStrategy};
use futures::future::join_all;
use object_explorer::expansion::StrategyRegistry;
use object_explorer::session::SessionRegistry;
use object_explorer::tree::{ChildDescriptor, NodeKind};

fn slow_databases(delay: Duration) -> ScriptedStrategy {
    ScriptedStrategy::new("databases", NodeKind::Server)
        .child(ChildDescriptor::new(NodeKind::Database, "sales"))
        .child(ChildDescriptor::new(NodeKind::Database, "inventory"))
        .with_delay(delay)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expands_populate_once() {
    let strategy = slow_databases(Duration::from_millis(100));
    let stats = strategy.stats.clone();
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(strategy))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let responses = join_all((0..5).map(|_| registry.expand(&created.session_id, "srv", false))).await;

    assert_eq!(stats.calls(), 1);
    assert_eq!(stats.max_in_flight(), 1);
    for response in &responses {
        assert_eq!(labels(&response.nodes), vec!["inventory", "sales"]);
        assert!(response.error_message.is_none());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_population_per_session_connection() {
    let databases = ScriptedStrategy::new("databases", NodeKind::Server)
        .child(ChildDescriptor::new(NodeKind::Database, "sales"))
        .child(ChildDescriptor::new(NodeKind::Database, "inventory"));
    let tables = ScriptedStrategy::new("tables", NodeKind::Database)
        .child(ChildDescriptor::new(NodeKind::Table, "dbo.orders"))
        .with_delay(Duration::from_millis(100));
    let stats = tables.stats.clone();
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(databases).with(tables))
        .build();
    let created = registry.create_session(params()).await.unwrap();
    registry.expand(&created.session_id, "srv", false).await;

    let (sales, inventory) = tokio::join!(
        registry.expand(&created.session_id, "srv/sales", false),
        registry.expand(&created.session_id, "srv/inventory", false)
    );

    assert_eq!(labels(&sales.nodes), vec!["dbo.orders"]);
    assert_eq!(labels(&inventory.nodes), vec!["dbo.orders"]);
    assert_eq!(stats.calls(), 2);
    assert_eq!(stats.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sessions_populate_independently() {
    let strategy = slow_databases(Duration::from_millis(200));
    let stats = strategy.stats.clone();
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(strategy))
        .build();
    let a = registry.create_session(params()).await.unwrap();
    let b = registry
        .create_session(params().with_database("inventory"))
        .await
        .unwrap();

    tokio::join!(
        registry.expand(&a.session_id, "srv", false),
        registry.expand(&b.session_id, "srv", false)
    );

    assert_eq!(stats.calls(), 2);
    assert_eq!(stats.max_in_flight(), 2);
}

#[tokio::test]
async fn test_expand_timeout_degrades_to_current_children() {
    let strategy = slow_databases(Duration::from_millis(300));
    let stats = strategy.stats.clone();
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(strategy))
        .expand_timeout(Duration::from_millis(50))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let degraded = registry.expand(&created.session_id, "srv", false).await;
    assert!(degraded.nodes.is_empty());
    assert!(degraded.error_message.unwrap().contains("timed out"));

    // The abandoned population still completes in the background.
    tokio::time::sleep(Duration::from_millis(500)).await;
    let settled = registry.expand(&created.session_id, "srv", false).await;
    assert_eq!(labels(&settled.nodes), vec!["inventory", "sales"]);
    assert!(settled.error_message.is_none());
    assert_eq!(stats.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_refresh_timeout_keeps_cached_children() {
    let strategy = ScriptedStrategy::new("databases", NodeKind::Server)
        .child(ChildDescriptor::new(NodeKind::Database, "sales"))
        .child(ChildDescriptor::new(NodeKind::Database, "inventory"))
        .with_delay_after(1, Duration::from_millis(400));
    let stats = strategy.stats.clone();
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(strategy))
        .expand_timeout(Duration::from_millis(100))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let first = registry.expand(&created.session_id, "srv", false).await;
    assert_eq!(labels(&first.nodes), vec!["inventory", "sales"]);

    let refreshed = registry.expand(&created.session_id, "srv", true).await;
    assert_eq!(labels(&refreshed.nodes), vec!["inventory", "sales"]);
    assert!(refreshed.error_message.unwrap().contains("timed out"));

    // The refresh is still running; the node lock times out but the cached
    // children are still served.
    let during = registry.expand(&created.session_id, "srv", false).await;
    assert_eq!(labels(&during.nodes), vec!["inventory", "sales"]);
    assert!(during.error_message.unwrap().contains("timed out"));

    tokio::time::sleep(Duration::from_millis(400)).await;
    let settled = registry.expand(&created.session_id, "srv", false).await;
    assert_eq!(labels(&settled.nodes), vec!["inventory", "sales"]);
    assert!(settled.error_message.is_none());
    assert_eq!(stats.calls(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_waiting_on_busy_node_times_out() {
    let strategy = slow_databases(Duration::from_millis(400));
    let registry = SessionRegistry::builder(MemoryConnector::new())
        .strategies(StrategyRegistry::new().with(strategy))
        .expand_timeout(Duration::from_millis(100))
        .build();
    let created = registry.create_session(params()).await.unwrap();

    let (first, second) = tokio::join!(
        registry.expand(&created.session_id, "srv", false),
        registry.expand(&created.session_id, "srv", false)
    );

    for response in [first, second] {
        assert!(response.nodes.is_empty());
        assert!(response.error_message.unwrap().contains("timed out"));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_close_during_expand() {
    let connector = MemoryConnector::new();
    let stats = connector.stats.clone();
    let registry = SessionRegistry::builder(connector)
        .strategies(StrategyRegistry::new().with(slow_databases(Duration::from_secs(30))))
        .expand_timeout(Duration::from_secs(5))
        .close_timeout(Duration::from_secs(2))
        .build();
    let created = registry.create_session(params()).await.unwrap();
    let session = registry.session(&created.session_id).unwrap();

    let (response, closed) = tokio::join!(
        registry.expand(&created.session_id, "srv", false),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            registry.close_session(&created.session_id).await
        }
    );

    assert!(closed);
    assert!(response.nodes.is_empty());
    assert!(response.error_message.unwrap().contains("closed"));
    assert_eq!(stats.disconnects(), 1);
    assert!(registry.is_empty());
    assert!(session.binding().is_closed());
}
