//! Path candidates for find requests.
//!
//! A find request names an object by kind and a few optional parts (schema,
//! name, database, parent names). The generator expands declarative
//! templates into every root-relative path the object could live at; the
//! orchestrator then resolves each one against the tree.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::FindSettings;
use crate::tree::NodeKind;

/// A find request as received from the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindNodesRequest {
    pub session_id: String,
    /// Kind name, e.g. `Table` or `Column`. Unknown kinds find nothing.
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    /// Names of the containing objects, nearest last.
    #[serde(default)]
    pub parent_names: Vec<String>,
}

impl FindNodesRequest {
    pub fn new(session_id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent_names.push(parent.into());
        self
    }

    /// Value of a template placeholder, if the request carries it.
    fn placeholder(&self, key: &str) -> Option<String> {
        let qualify = |name: &str| match &self.schema {
            Some(schema) => format!("{}.{}", schema, name),
            None => name.to_string(),
        };

        match key {
            "database" => self.database.clone(),
            "schema" => self.schema.clone(),
            "name" => self.name.clone(),
            "object" => self.name.as_deref().map(qualify),
            "parent" => self.parent_names.last().cloned(),
            "parent_object" => self.parent_names.last().map(|p| qualify(p)),
            _ => None,
        }
    }
}

/// Produces root-relative candidate paths for a find request.
pub trait PathCandidates: Send + Sync {
    fn candidates(&self, kind: NodeKind, request: &FindNodesRequest) -> Vec<String>;
}

/// Template-driven [`PathCandidates`].
///
/// Templates are root-relative `/`-joined paths with `{placeholder}`
/// segments: `database`, `schema`, `name`, `object` (schema-qualified name),
/// `parent` and `parent_object`. A template that needs a placeholder the
/// request does not carry is skipped. The empty template addresses the root.
#[derive(Debug, Clone, Default)]
pub struct TemplatePathGenerator {
    templates: HashMap<NodeKind, Vec<String>>,
}

impl TemplatePathGenerator {
    /// No templates at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard server hierarchy.
    pub fn with_defaults() -> Self {
        let mut generator = Self::new();
        generator.add_template(NodeKind::Server, "");

        for db in ["Databases/{database}", "Databases/System Databases/{database}"] {
            generator.add_template(NodeKind::Database, db);
            generator.add_template(NodeKind::View, format!("{}/Views/{{object}}", db));
            generator.add_template(NodeKind::Function, format!("{}/Functions/{{object}}", db));
        }

        generator
            .add_template(NodeKind::Table, "Databases/{database}/Tables/{object}")
            .add_template(
                NodeKind::Table,
                "Databases/System Databases/{database}/Tables/System Tables/{object}",
            )
            .add_template(
                NodeKind::Table,
                "Databases/{database}/Tables/System Tables/{object}",
            )
            .add_template(
                NodeKind::Column,
                "Databases/{database}/Tables/{parent_object}/Columns/{name}",
            )
            .add_template(
                NodeKind::Column,
                "Databases/{database}/Views/{parent_object}/Columns/{name}",
            )
            .add_template(
                NodeKind::Column,
                "Databases/System Databases/{database}/Tables/System Tables/{parent_object}/Columns/{name}",
            );

        generator
    }

    /// Built-in templates extended (or replaced) by configured ones.
    ///
    /// Configured kinds that do not parse are logged and ignored.
    pub fn from_settings(settings: &FindSettings) -> Self {
        let mut generator = if settings.replace_defaults {
            Self::new()
        } else {
            Self::with_defaults()
        };

        for (kind, templates) in &settings.templates {
            match NodeKind::from_str(kind) {
                Ok(kind) => {
                    for template in templates {
                        generator.add_template(kind, template.clone());
                    }
                }
                Err(err) => tracing::warn!(error = %err, "ignoring find templates"),
            }
        }

        generator
    }

    pub fn add_template(&mut self, kind: NodeKind, template: impl Into<String>) -> &mut Self {
        self.templates.entry(kind).or_default().push(template.into());
        self
    }

    pub fn templates(&self, kind: NodeKind) -> &[String] {
        self.templates.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl PathCandidates for TemplatePathGenerator {
    fn candidates(&self, kind: NodeKind, request: &FindNodesRequest) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for template in self.templates(kind) {
            if let Some(path) = render(template, request) {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        paths
    }
}

/// Substitute placeholders, or `None` if one is unavailable.
fn render(template: &str, request: &FindNodesRequest) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        out.push_str(&request.placeholder(&after[..end])?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);

    Some(out)
}
