//! Serializable views of tree nodes and operation results.

use serde::{Deserialize, Serialize};

use crate::tree::{ObjectMetadata, TreeNode};

/// Client-facing snapshot of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub is_leaf: bool,
    pub label: String,
    pub node_path: String,
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_sub_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ObjectMetadata>,
}

impl NodeInfo {
    pub fn from_node(node: &TreeNode) -> Self {
        Self {
            is_leaf: node.is_leaf(),
            label: node.label().to_string(),
            node_path: node.path(),
            node_type: node.node_type().to_string(),
            node_sub_type: node.sub_type().map(str::to_string),
            node_status: node.status().map(str::to_string),
            error_message: node.error_message(),
            metadata: node.metadata().cloned(),
        }
    }
}

/// Result of an expand or refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandResponse {
    pub session_id: String,
    pub node_path: String,
    pub nodes: Vec<NodeInfo>,
    /// Strategy failures or a timeout message. Children found before the
    /// failure are still listed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ExpandResponse {
    /// The not-found outcome: no children, no error.
    pub fn empty(session_id: impl Into<String>, node_path: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            node_path: node_path.into(),
            nodes: Vec::new(),
            error_message: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Result of creating (or reusing) a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
    pub root_node: NodeInfo,
    /// Whether an active session with the same id was returned.
    pub reused: bool,
}

/// Asynchronous notifications emitted by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExplorerEvent {
    SessionCreated {
        session_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        root_node: Option<NodeInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error_message: Option<String>,
    },
    ExpandCompleted(ExpandResponse),
    SessionClosed {
        session_id: String,
    },
}
