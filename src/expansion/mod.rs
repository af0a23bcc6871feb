//! Expansion strategies.
//!
//! An expansion strategy produces the children of a node from a backend
//! connection. Several strategies may apply to one parent kind; they run in
//! registration order and their results are merged.
//!
//! # Example
//!
//! ```ignore
//! use object_explorer::expansion::{FolderStrategy, StrategyRegistry};
//! use object_explorer::tree::NodeKind;
//!
//! let strategies = StrategyRegistry::new()
//!     .with(FolderStrategy::new(NodeKind::Server).folder(NodeKind::DatabasesFolder, 0))
//!     .with(my_database_strategy);
//! ```

mod filter;
mod folders;
mod registry;

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::tree::{ChildDescriptor, NodeDescriptor, NodeKind};
use crate::worker::WorkerError;

pub use filter::{filters_for_platform, matches_all, FilterOperator, NodeFilter, PropertyFilter, ValidFor};
pub use folders::FolderStrategy;
pub use registry::StrategyRegistry;

/// Errors raised by a single strategy. They are contained at the node level.
#[derive(Error, Debug)]
pub enum StrategyError {
    /// Worker transport failure.
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Backend-reported failure.
    #[error("{0}")]
    Backend(String),

    /// The strategy was invoked for a parent it does not handle.
    #[error("strategy {strategy} does not support parent kind {kind}")]
    UnsupportedParent {
        strategy: String,
        kind: NodeKind,
    },
}

impl StrategyError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// Inputs for one strategy invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExpandRequest<'a> {
    pub parent: &'a NodeDescriptor,
    pub refresh: bool,
    pub name_filter: Option<&'a str>,
    pub include_system_objects: bool,
    /// The strategy's own filters, narrowed to the session's platform.
    pub filters: &'a [NodeFilter],
}

/// Produces the children of nodes of the kinds it supports.
#[async_trait]
pub trait ExpansionStrategy<C>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Parent kinds this strategy applies to.
    fn supported_parents(&self) -> &[NodeKind];

    /// Declarative property filters, forwarded with each request.
    fn filters(&self) -> &[NodeFilter] {
        &[]
    }

    /// Produce child descriptors. Long-running backends should observe
    /// `cancel`.
    async fn expand(
        &self,
        request: ExpandRequest<'_>,
        connection: &C,
        cancel: &CancellationToken,
    ) -> Result<Vec<ChildDescriptor>, StrategyError>;
}

/// What a node needs from its session to populate itself.
pub struct PopulateContext<'a, C> {
    pub strategies: &'a StrategyRegistry<C>,
    /// The bound backend connection, valid for this population only.
    pub connection: &'a C,
    pub platform: ValidFor,
    pub include_system_objects: bool,
}
