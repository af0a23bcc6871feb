//! Node path addressing.
//!
//! A node path is the `/`-joined chain of ancestor path names, root first.
//! Climbing stops at the first ancestor whose value is empty, so a node under
//! an unnamed ancestor is addressed relative to it.

use std::sync::Arc;

use async_trait::async_trait;

use super::node::TreeNode;

/// Separator between path segments.
pub const PATH_SEPARATOR: char = '/';

/// Expands a node on behalf of [`resolve`].
///
/// The session orchestrator implements this with the full locking and
/// connection-binding protocol.
#[async_trait]
pub trait NodeExpander: Send + Sync {
    async fn expand_node(&self, node: &Arc<TreeNode>) -> Vec<Arc<TreeNode>>;
}

/// Compute the path of a node by walking to the root.
pub fn node_path(node: &TreeNode) -> String {
    if node.value().is_empty() {
        return String::new();
    }

    let mut segments = vec![node.path_name().to_string()];
    let mut next = node.parent();
    while let Some(ancestor) = next {
        if ancestor.value().is_empty() {
            break;
        }
        segments.push(ancestor.path_name().to_string());
        next = ancestor.parent();
    }
    segments.reverse();
    segments.join(&PATH_SEPARATOR.to_string())
}

/// Join a root path and a relative path.
pub fn join(base: &str, relative: &str) -> String {
    match (base.is_empty(), relative.is_empty()) {
        (true, _) => relative.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{}{}{}", base, PATH_SEPARATOR, relative),
    }
}

/// Whether `candidate` is `target` itself or one of its ancestors' paths.
///
/// Prefix matching respects segment boundaries: `srv/Data` is not a prefix
/// of `srv/Databases`.
pub fn is_path_prefix(candidate: &str, target: &str) -> bool {
    if candidate.is_empty() {
        return true;
    }
    match target.strip_prefix(candidate) {
        Some(rest) => rest.is_empty() || rest.starts_with(PATH_SEPARATOR),
        None => false,
    }
}

/// Find a node among already-populated children. Never expands.
pub fn find_node(root: &Arc<TreeNode>, target: &str) -> Option<Arc<TreeNode>> {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        let path = node.path();
        if path == target {
            return Some(node);
        }
        if is_path_prefix(&path, target) {
            stack.extend(node.children().into_iter().rev());
        }
    }
    None
}

/// Depth-first search for `target`, expanding unpopulated nodes on the way
/// down when an expander is supplied.
///
/// Only nodes whose path is a prefix of the target are expanded, so
/// unrelated subtrees are never populated. Returns `None` when nothing
/// matches; callers treat that as a stale path.
pub async fn resolve(
    root: &Arc<TreeNode>,
    target: &str,
    expander: Option<&dyn NodeExpander>,
) -> Option<Arc<TreeNode>> {
    let mut stack = vec![root.clone()];
    while let Some(node) = stack.pop() {
        let path = node.path();
        if path == target {
            return Some(node);
        }
        if !is_path_prefix(&path, target) {
            continue;
        }

        let children = match expander {
            Some(expander) if !node.is_leaf() && !node.children_collection().is_initialized() => {
                expander.expand_node(&node).await
            }
            _ => node.children(),
        };
        stack.extend(children.into_iter().rev());
    }
    None
}
