//! Node kind tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of node kinds in the object hierarchy.
///
/// Folder kinds are distinct tags so that expansion strategies can be keyed on
/// them directly (the "Tables" folder and the "System Tables" folder list
/// different objects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Server,
    DatabasesFolder,
    SystemDatabasesFolder,
    Database,
    TablesFolder,
    SystemTablesFolder,
    ViewsFolder,
    FunctionsFolder,
    Table,
    View,
    Function,
    ColumnsFolder,
    Column,
}

impl NodeKind {
    /// All kinds, in hierarchy order.
    pub const ALL: [NodeKind; 13] = [
        NodeKind::Server,
        NodeKind::DatabasesFolder,
        NodeKind::SystemDatabasesFolder,
        NodeKind::Database,
        NodeKind::TablesFolder,
        NodeKind::SystemTablesFolder,
        NodeKind::ViewsFolder,
        NodeKind::FunctionsFolder,
        NodeKind::Table,
        NodeKind::View,
        NodeKind::Function,
        NodeKind::ColumnsFolder,
        NodeKind::Column,
    ];

    /// The coarse node type reported to clients.
    pub fn node_type(&self) -> &'static str {
        match self {
            NodeKind::Server => "Server",
            NodeKind::Database => "Database",
            NodeKind::Table => "Table",
            NodeKind::View => "View",
            NodeKind::Function => "Function",
            NodeKind::Column => "Column",
            _ => "Folder",
        }
    }

    /// Display name of a folder kind.
    pub fn folder_name(&self) -> Option<&'static str> {
        match self {
            NodeKind::DatabasesFolder => Some("Databases"),
            NodeKind::SystemDatabasesFolder => Some("System Databases"),
            NodeKind::TablesFolder => Some("Tables"),
            NodeKind::SystemTablesFolder => Some("System Tables"),
            NodeKind::ViewsFolder => Some("Views"),
            NodeKind::FunctionsFolder => Some("Functions"),
            NodeKind::ColumnsFolder => Some("Columns"),
            _ => None,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.folder_name().is_some()
    }

    /// Kinds that never have children.
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeKind::Column)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.folder_name() {
            Some(name) => write!(f, "Folder({})", name),
            None => f.write_str(self.node_type()),
        }
    }
}

/// Error returned when a kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown node kind: {0}")]
pub struct UnknownKind(pub String);

impl FromStr for NodeKind {
    type Err = UnknownKind;

    /// Parses the object kinds a client can search for. Folder kinds are not
    /// addressable by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "server" => Ok(NodeKind::Server),
            "database" => Ok(NodeKind::Database),
            "table" => Ok(NodeKind::Table),
            "view" => Ok(NodeKind::View),
            "function" | "userdefinedfunction" => Ok(NodeKind::Function),
            "column" => Ok(NodeKind::Column),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}
