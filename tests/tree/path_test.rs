// tests/tree/path_test.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use insta::assert_snapshot;
use object_explorer::tree::{self, path, ChildDescriptor, NodeExpander, NodeKind, ObjectMetadata, TreeNode};

fn attach(parent: &Arc<TreeNode>, desc: ChildDescriptor) -> Arc<TreeNode> {
    let node = TreeNode::from_descriptor(desc);
    parent.add_child(node.clone());
    node
}

/// srv/Databases/{sales, System Databases/master}
fn sample_tree() -> Arc<TreeNode> {
    let root = TreeNode::root("srv", None);
    let dbs = attach(&root, ChildDescriptor::folder(NodeKind::DatabasesFolder));
    let system = attach(&dbs, ChildDescriptor::folder(NodeKind::SystemDatabasesFolder));
    attach(&dbs, ChildDescriptor::new(NodeKind::Database, "sales"));
    attach(&system, ChildDescriptor::new(NodeKind::Database, "master"));
    root
}

/// Populates every node it is asked about with a fixed set of children.
struct CountingExpander {
    calls: AtomicUsize,
}

#[async_trait]
impl NodeExpander for CountingExpander {
    async fn expand_node(&self, node: &Arc<TreeNode>) -> Vec<Arc<TreeNode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let children = node.children_collection();
        children.begin_init();
        if node.kind() == NodeKind::Database {
            node.add_child(TreeNode::from_descriptor(ChildDescriptor::folder(NodeKind::TablesFolder)));
        }
        if node.kind() == NodeKind::TablesFolder {
            node.add_child(TreeNode::from_descriptor(ChildDescriptor::object(
                NodeKind::Table,
                ObjectMetadata::new("Table", "orders").with_schema("dbo"),
            )));
        }
        children.end_init();
        node.children()
    }
}

#[test]
fn test_object_path_uses_qualified_name() {
    let root = sample_tree();
    let sales = tree::find_node(&root, "srv/Databases/sales").unwrap();
    let tables = attach(&sales, ChildDescriptor::folder(NodeKind::TablesFolder));
    let orders = attach(
        &tables,
        ChildDescriptor::object(NodeKind::Table, ObjectMetadata::new("Table", "orders").with_schema("dbo")),
    );

    assert_snapshot!(orders.path(), @"srv/Databases/sales/Tables/dbo.orders");
    assert_eq!(orders.label(), "dbo.orders");
}

#[test]
fn test_system_database_path() {
    let root = sample_tree();
    let master = tree::find_node(&root, "srv/Databases/System Databases/master").unwrap();
    assert_eq!(master.kind(), NodeKind::Database);
    assert!(master.descriptor().under_system_databases());
}

#[test]
fn test_descriptor_lineage_root_first() {
    let root = sample_tree();
    let master = tree::find_node(&root, "srv/Databases/System Databases/master").unwrap();
    let lineage: Vec<_> = master
        .descriptor()
        .lineage
        .into_iter()
        .map(|entry| entry.value)
        .collect();
    assert_eq!(lineage, vec!["srv", "Databases", "System Databases", "master"]);
}

#[test]
fn test_find_node_rejects_partial_segment() {
    let root = sample_tree();
    assert!(tree::find_node(&root, "srv/Data").is_none());
    assert!(tree::find_node(&root, "srv/Databases/sal").is_none());
}

#[tokio::test]
async fn test_resolve_expands_only_along_target() {
    let root = sample_tree();
    let expander = CountingExpander {
        calls: AtomicUsize::new(0),
    };

    let target = path::join(&root.path(), "Databases/sales/Tables/dbo.orders");
    let found = tree::resolve(&root, &target, Some(&expander)).await.unwrap();

    assert_eq!(found.kind(), NodeKind::Table);
    assert_eq!(found.path(), target);
    // srv, Databases, sales and its Tables folder. master stays untouched.
    assert_eq!(expander.calls.load(Ordering::SeqCst), 4);
    let master = tree::find_node(&root, "srv/Databases/System Databases/master").unwrap();
    assert!(master.children().is_empty());
}

#[tokio::test]
async fn test_resolve_without_expander_is_find() {
    let root = sample_tree();
    assert!(tree::resolve(&root, "srv/Databases/sales/Tables", None)
        .await
        .is_none());
    assert!(tree::resolve(&root, "srv/Databases/sales", None).await.is_some());
}

#[tokio::test]
async fn test_resolve_stale_path_is_none() {
    let root = sample_tree();
    let expander = CountingExpander {
        calls: AtomicUsize::new(0),
    };
    let found = tree::resolve(&root, "srv/Databases/gone/Tables", Some(&expander)).await;
    assert!(found.is_none());
    // Only the ancestors of the missing database were expanded.
    assert_eq!(expander.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_every_path_resolves_to_its_node() {
    let root = sample_tree();
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        let found = tree::resolve(&root, &node.path(), None).await.unwrap();
        assert!(Arc::ptr_eq(&found, &node), "{} did not round-trip", node.path());
        stack.extend(node.children());
    }
}
