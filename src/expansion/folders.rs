//! Fixed folder layers.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{ExpandRequest, ExpansionStrategy, StrategyError};
use crate::tree::{ChildDescriptor, NodeKind};

#[derive(Debug, Clone)]
struct FolderSpec {
    kind: NodeKind,
    priority: i32,
    system: bool,
}

/// Backend-free strategy that emits a fixed set of folders.
///
/// System folders are only emitted when the session includes system objects.
#[derive(Debug, Clone)]
pub struct FolderStrategy {
    name: String,
    parents: Vec<NodeKind>,
    folders: Vec<FolderSpec>,
}

impl FolderStrategy {
    pub fn new(parent: NodeKind) -> Self {
        Self {
            name: format!("folders:{}", parent),
            parents: vec![parent],
            folders: Vec::new(),
        }
    }

    /// Also apply to another parent kind.
    pub fn and_parent(mut self, parent: NodeKind) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn folder(mut self, kind: NodeKind, priority: i32) -> Self {
        self.folders.push(FolderSpec {
            kind,
            priority,
            system: false,
        });
        self
    }

    pub fn system_folder(mut self, kind: NodeKind, priority: i32) -> Self {
        self.folders.push(FolderSpec {
            kind,
            priority,
            system: true,
        });
        self
    }
}

#[async_trait]
impl<C> ExpansionStrategy<C> for FolderStrategy
where
    C: Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn supported_parents(&self) -> &[NodeKind] {
        &self.parents
    }

    async fn expand(
        &self,
        request: ExpandRequest<'_>,
        _connection: &C,
        _cancel: &CancellationToken,
    ) -> Result<Vec<ChildDescriptor>, StrategyError> {
        Ok(self
            .folders
            .iter()
            .filter(|spec| !spec.system || request.include_system_objects)
            .map(|spec| ChildDescriptor::folder(spec.kind).with_sort_priority(spec.priority))
            .collect())
    }
}
