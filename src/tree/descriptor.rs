//! Descriptors exchanged with expansion strategies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::kind::NodeKind;

/// Opaque backend object metadata carried on a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Backend object type (e.g. "Table", "Database").
    #[serde(default)]
    pub metadata_type: String,
    /// Schema the object belongs to.
    #[serde(default)]
    pub schema: Option<String>,
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Name of the owning object, for columns and similar.
    #[serde(default)]
    pub parent_name: Option<String>,
    /// Backend-specific unique reference.
    #[serde(default)]
    pub urn: Option<String>,
    /// Arbitrary object properties used by property filters.
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

impl ObjectMetadata {
    pub fn new(metadata_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            metadata_type: metadata_type.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_name = Some(parent.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// `schema.name` when a schema is present, otherwise the bare name.
    pub fn qualified_name(&self) -> String {
        match &self.schema {
            Some(schema) if !schema.is_empty() => format!("{}.{}", schema, self.name),
            _ => self.name.clone(),
        }
    }
}

/// A child produced by an expansion strategy, before it becomes a tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildDescriptor {
    pub kind: NodeKind,
    /// Raw node value.
    pub value: String,
    /// Path segment, defaults to `value`.
    #[serde(default)]
    pub path_name: Option<String>,
    /// Display label, defaults per kind.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub sort_priority: Option<i32>,
    #[serde(default)]
    pub metadata: Option<ObjectMetadata>,
}

impl ChildDescriptor {
    pub fn new(kind: NodeKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
            path_name: None,
            label: None,
            sub_type: None,
            status: None,
            sort_priority: None,
            metadata: None,
        }
    }

    /// Descriptor for a fixed folder. Non-folder kinds get an empty value.
    pub fn folder(kind: NodeKind) -> Self {
        Self::new(kind, kind.folder_name().unwrap_or_default())
    }

    /// Descriptor for a schema-qualified object, valued `schema.name`.
    pub fn object(kind: NodeKind, metadata: ObjectMetadata) -> Self {
        let mut desc = Self::new(kind, metadata.qualified_name());
        desc.metadata = Some(metadata);
        desc
    }

    pub fn with_path_name(mut self, path_name: impl Into<String>) -> Self {
        self.path_name = Some(path_name.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_sort_priority(mut self, priority: i32) -> Self {
        self.sort_priority = Some(priority);
        self
    }

    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// One ancestor in a node's lineage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub kind: NodeKind,
    pub value: String,
}

/// Read-only view of a parent node handed to expansion strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub kind: NodeKind,
    pub value: String,
    pub path: String,
    #[serde(default)]
    pub metadata: Option<ObjectMetadata>,
    /// Ancestors from the root down to and including this node.
    #[serde(default)]
    pub lineage: Vec<LineageEntry>,
}

impl NodeDescriptor {
    /// Value of the nearest node (self included) of the given kind.
    pub fn nearest(&self, kind: NodeKind) -> Option<&str> {
        self.lineage
            .iter()
            .rev()
            .find(|entry| entry.kind == kind)
            .map(|entry| entry.value.as_str())
    }

    /// The database this node lives under, if any.
    pub fn database(&self) -> Option<&str> {
        self.nearest(NodeKind::Database)
    }

    /// Whether the node sits under the "System Databases" folder.
    pub fn under_system_databases(&self) -> bool {
        self.lineage
            .iter()
            .any(|entry| entry.kind == NodeKind::SystemDatabasesFolder)
    }
}
