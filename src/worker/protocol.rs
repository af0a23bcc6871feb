//! Protocol types for worker communication.
//!
//! Every message is one JSON object per line. Requests carry a unique id
//! that the worker echoes in its response.

use serde::{Deserialize, Serialize};

use crate::expansion::NodeFilter;
use crate::tree::{ChildDescriptor, NodeDescriptor, NodeKind};

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the worker.
#[derive(Debug, Clone, Serialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// Method name (e.g., "explorer.list_children").
    pub method: String,
    /// Method-specific parameters.
    pub params: serde_json::Value,
}

/// Response envelope received from the worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    /// Error information (present if success = false).
    #[serde(default)]
    pub error: Option<ErrorInfo>,
}

/// Error information in a failed response.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorInfo {
    /// Error code.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

// ============================================================================
// Session methods
// ============================================================================

/// Parameters for `session.connect`.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectParams {
    /// Database driver name (e.g., "duckdb", "mssql").
    pub driver: String,
    /// Driver-specific connection string.
    pub connection_string: String,
}

/// Response for `session.connect`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectResponse {
    /// Worker-issued handle used by every later request.
    pub connection_id: String,
    /// Server name as reported by the server, if it differs from the host.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Server major version, where the driver reports one.
    #[serde(default)]
    pub server_major_version: Option<u32>,
    /// Whether the server is a cloud edition (e.g. Azure SQL).
    #[serde(default)]
    pub is_cloud: bool,
}

/// Parameters for `session.disconnect`.
#[derive(Debug, Clone, Serialize)]
pub struct DisconnectParams {
    pub connection_id: String,
}

/// Response for `session.disconnect`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisconnectResponse {
    #[serde(default)]
    pub closed: bool,
}

// ============================================================================
// Explorer methods
// ============================================================================

/// Parameters for `explorer.list_children`.
#[derive(Debug, Clone, Serialize)]
pub struct ListChildrenParams<'a> {
    pub connection_id: &'a str,
    /// The node being expanded, with its ancestry.
    pub parent: &'a NodeDescriptor,
    /// Kinds of children requested.
    pub child_kinds: &'a [NodeKind],
    pub refresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<&'a str>,
    pub include_system_objects: bool,
    /// Property filters already narrowed to the server's platform.
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    pub filters: &'a [NodeFilter],
}

/// Response for `explorer.list_children`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListChildrenResponse {
    #[serde(default)]
    pub children: Vec<ChildDescriptor>,
}

// ============================================================================
// Method Names
// ============================================================================

/// Worker method names.
pub mod methods {
    pub const CONNECT: &str = "session.connect";
    pub const DISCONNECT: &str = "session.disconnect";
    pub const LIST_CHILDREN: &str = "explorer.list_children";
}
