//! Tree node entity and population.

use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use tokio_util::sync::CancellationToken;

use super::children::{ChildCollection, PopulationState};
use super::descriptor::{ChildDescriptor, LineageEntry, NodeDescriptor, ObjectMetadata};
use super::kind::NodeKind;
use super::{lock, path};
use crate::expansion::{filters_for_platform, ExpandRequest, PopulateContext};

/// One addressable element of the object hierarchy.
///
/// A node exclusively owns its children (`Arc`) and holds a non-owning
/// back-reference to its parent (`Weak`) that is used for path computation
/// only. Removing a child clears that reference.
pub struct TreeNode {
    value: String,
    path_name: String,
    label: String,
    kind: NodeKind,
    sub_type: Option<String>,
    status: Option<String>,
    sort_priority: Option<i32>,
    is_always_leaf: bool,
    metadata: Option<ObjectMetadata>,

    parent: RwLock<Weak<TreeNode>>,
    path: Mutex<Option<String>>,
    children: ChildCollection,
    /// Whether the committed children came from a name-filtered population.
    filtered: AtomicBool,
    error_message: Mutex<Option<String>>,
    /// Exclusive population rights, taken by the session orchestrator.
    population_lock: Arc<tokio::sync::Mutex<()>>,
}

impl TreeNode {
    /// Materialize a descriptor into a detached node.
    ///
    /// Kind-specific defaults (labels, leaf flags) are applied here and
    /// nowhere else.
    pub fn from_descriptor(desc: ChildDescriptor) -> Arc<TreeNode> {
        let (label, is_always_leaf) = match desc.kind {
            NodeKind::Column => (desc.label.clone().unwrap_or_else(|| column_label(&desc)), true),
            NodeKind::Table | NodeKind::View | NodeKind::Function => (
                desc.label.clone().unwrap_or_else(|| {
                    desc.metadata
                        .as_ref()
                        .map(ObjectMetadata::qualified_name)
                        .unwrap_or_else(|| desc.value.clone())
                }),
                false,
            ),
            NodeKind::Database => (
                desc.label.clone().unwrap_or_else(|| match &desc.status {
                    Some(status) if !status.is_empty() => format!("{} ({})", desc.value, status),
                    _ => desc.value.clone(),
                }),
                false,
            ),
            kind if kind.is_folder() => (
                desc.label
                    .clone()
                    .or_else(|| kind.folder_name().map(str::to_string))
                    .unwrap_or_else(|| desc.value.clone()),
                false,
            ),
            _ => (desc.label.clone().unwrap_or_else(|| desc.value.clone()), false),
        };

        let path_name = desc.path_name.unwrap_or_else(|| desc.value.clone());

        Arc::new(TreeNode {
            value: desc.value,
            path_name,
            label,
            kind: desc.kind,
            sub_type: desc.sub_type,
            status: desc.status,
            sort_priority: desc.sort_priority,
            is_always_leaf,
            metadata: desc.metadata,
            parent: RwLock::new(Weak::new()),
            path: Mutex::new(None),
            children: ChildCollection::new(),
            filtered: AtomicBool::new(false),
            error_message: Mutex::new(None),
            population_lock: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    /// Create a server root node.
    pub fn root(server_name: impl Into<String>, metadata: Option<ObjectMetadata>) -> Arc<TreeNode> {
        let mut desc = ChildDescriptor::new(NodeKind::Server, server_name);
        desc.metadata = metadata;
        Self::from_descriptor(desc)
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn path_name(&self) -> &str {
        &self.path_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn node_type(&self) -> &'static str {
        self.kind.node_type()
    }

    pub fn sub_type(&self) -> Option<&str> {
        self.sub_type.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn sort_priority(&self) -> Option<i32> {
        self.sort_priority
    }

    pub fn is_leaf(&self) -> bool {
        self.is_always_leaf
    }

    pub fn metadata(&self) -> Option<&ObjectMetadata> {
        self.metadata.as_ref()
    }

    // ------------------------------------------------------------------
    // Parent linkage and paths
    // ------------------------------------------------------------------

    pub fn parent(&self) -> Option<Arc<TreeNode>> {
        self.parent
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .upgrade()
    }

    pub(crate) fn set_parent(&self, parent: &Arc<TreeNode>) {
        *self.parent.write().unwrap_or_else(|e| e.into_inner()) = Arc::downgrade(parent);
        self.invalidate_path();
    }

    pub(crate) fn clear_parent(&self) {
        *self.parent.write().unwrap_or_else(|e| e.into_inner()) = Weak::new();
        self.invalidate_path();
    }

    /// Drop the memoized path here and below; descendants derive theirs
    /// from this node's chain.
    fn invalidate_path(&self) {
        *lock(&self.path) = None;
        for child in self.children.attached() {
            child.invalidate_path();
        }
    }

    /// Deterministic path of this node, memoized until the parent changes.
    ///
    /// The memo lock is held across the walk, so an invalidation racing
    /// with it lands after the store. Ancestors' memo locks are never taken
    /// here, so locks are only ever held one node at a time.
    pub fn path(&self) -> String {
        let mut memo = lock(&self.path);
        if let Some(cached) = memo.as_ref() {
            return cached.clone();
        }
        let computed = path::node_path(self);
        *memo = Some(computed.clone());
        computed
    }

    /// Read-only view handed to expansion strategies.
    pub fn descriptor(&self) -> NodeDescriptor {
        let mut lineage = vec![LineageEntry {
            kind: self.kind,
            value: self.value.clone(),
        }];
        let mut next = self.parent();
        while let Some(ancestor) = next {
            lineage.push(LineageEntry {
                kind: ancestor.kind,
                value: ancestor.value.clone(),
            });
            next = ancestor.parent();
        }
        lineage.reverse();

        NodeDescriptor {
            kind: self.kind,
            value: self.value.clone(),
            path: self.path(),
            metadata: self.metadata.clone(),
            lineage,
        }
    }

    // ------------------------------------------------------------------
    // Children
    // ------------------------------------------------------------------

    /// Attach a child and insert it into the collection.
    pub fn add_child(self: &Arc<Self>, child: Arc<TreeNode>) {
        child.set_parent(self);
        self.children.add(child);
    }

    /// Current children, without triggering population.
    pub fn children(&self) -> Vec<Arc<TreeNode>> {
        self.children.snapshot()
    }

    pub fn children_collection(&self) -> &ChildCollection {
        &self.children
    }

    pub fn child_state(&self) -> PopulationState {
        self.children.state()
    }

    pub fn population_lock(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.population_lock.clone()
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Failure text from the last population, if any strategy failed.
    pub fn error_message(&self) -> Option<String> {
        lock(&self.error_message).clone()
    }

    fn clear_error(&self) {
        *lock(&self.error_message) = None;
    }

    fn append_error(&self, message: String) {
        let mut error = lock(&self.error_message);
        *error = Some(match error.take() {
            Some(existing) => format!("{}\n{}", existing, message),
            None => message,
        });
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    /// Nodes with a sort priority come first, in ascending priority.
    /// Nodes without one follow, ordered case-insensitively by value.
    pub fn compare_to(&self, other: &TreeNode) -> Ordering {
        match (self.sort_priority, other.sort_priority) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self
                .value
                .chars()
                .flat_map(char::to_lowercase)
                .cmp(other.value.chars().flat_map(char::to_lowercase)),
        }
    }

    // ------------------------------------------------------------------
    // Population
    // ------------------------------------------------------------------

    /// Return the children, populating first unless already initialized.
    pub async fn expand<C>(
        self: &Arc<Self>,
        ctx: &PopulateContext<'_, C>,
        name_filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<Arc<TreeNode>>
    where
        C: Send + Sync + 'static,
    {
        if self.has_reusable_children(name_filter) {
            return self.children();
        }
        self.populate(ctx, false, name_filter, cancel).await
    }

    /// Whether [`expand`](Self::expand) would return the current children
    /// without touching the backend.
    pub fn has_reusable_children(&self, name_filter: Option<&str>) -> bool {
        self.children.is_initialized()
            && name_filter.is_none()
            && !self.filtered.load(AtomicOrdering::SeqCst)
    }

    /// Repopulate unconditionally.
    pub async fn refresh<C>(
        self: &Arc<Self>,
        ctx: &PopulateContext<'_, C>,
        name_filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<Arc<TreeNode>>
    where
        C: Send + Sync + 'static,
    {
        self.populate(ctx, true, name_filter, cancel).await
    }

    async fn populate<C>(
        self: &Arc<Self>,
        ctx: &PopulateContext<'_, C>,
        refresh: bool,
        name_filter: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<Arc<TreeNode>>
    where
        C: Send + Sync + 'static,
    {
        if self.is_always_leaf {
            return Vec::new();
        }
        if !self.children.begin_population() {
            tracing::debug!(path = %self.path(), "population already in flight");
            return self.children();
        }
        self.clear_error();
        let mut guard = PopulationGuard::new(&self.children);

        if cancel.is_cancelled() {
            tracing::debug!(path = %self.path(), "population cancelled before start");
            return Vec::new();
        }

        let parent = self.descriptor();
        let needle = name_filter.map(str::to_lowercase);

        for strategy in ctx.strategies.applicable(self.kind) {
            let filters = filters_for_platform(strategy.filters(), ctx.platform);
            let request = ExpandRequest {
                parent: &parent,
                refresh,
                name_filter,
                include_system_objects: ctx.include_system_objects,
                filters: &filters,
            };

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!(
                        path = %parent.path,
                        strategy = strategy.name(),
                        "population cancelled"
                    );
                    break;
                }
                result = strategy.expand(request, ctx.connection, cancel) => result,
            };

            match result {
                Ok(descriptors) => {
                    for desc in descriptors {
                        let child = TreeNode::from_descriptor(desc);
                        if matches_name(&child, needle.as_deref()) {
                            self.add_child(child);
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        path = %parent.path,
                        strategy = strategy.name(),
                        error = %err,
                        "expansion strategy failed"
                    );
                    self.append_error(err.to_string());
                }
            }
        }

        guard.commit();
        drop(guard);
        self.filtered
            .store(name_filter.is_some(), AtomicOrdering::SeqCst);
        self.children()
    }
}

/// Exits `Populating` on every path. An uncommitted guard (early return or
/// a dropped future) aborts so the node stays retryable.
struct PopulationGuard<'a> {
    children: &'a ChildCollection,
    committed: bool,
}

impl<'a> PopulationGuard<'a> {
    fn new(children: &'a ChildCollection) -> Self {
        Self {
            children,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for PopulationGuard<'_> {
    fn drop(&mut self) {
        if self.committed {
            self.children.end_init();
        } else {
            self.children.abort_init();
        }
    }
}

fn matches_name(node: &TreeNode, needle: Option<&str>) -> bool {
    match needle {
        Some(needle) if !node.kind.is_folder() => node.value.to_lowercase().contains(needle),
        _ => true,
    }
}

fn column_label(desc: &ChildDescriptor) -> String {
    let data_type = desc
        .metadata
        .as_ref()
        .and_then(|m| m.properties.get("data_type"))
        .and_then(|v| v.as_str());
    let nullable = desc
        .metadata
        .as_ref()
        .and_then(|m| m.properties.get("is_nullable"))
        .and_then(|v| v.as_bool());

    match (data_type, nullable) {
        (Some(ty), Some(true)) => format!("{} ({}, null)", desc.value, ty),
        (Some(ty), Some(false)) => format!("{} ({}, not null)", desc.value, ty),
        (Some(ty), None) => format!("{} ({})", desc.value, ty),
        _ => desc.value.clone(),
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("kind", &self.kind)
            .field("value", &self.value)
            .field("path", &self.path())
            .field("state", &self.children.state())
            .field("children", &self.children.len())
            .finish()
    }
}
