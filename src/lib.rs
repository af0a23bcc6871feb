//! # Object Explorer
//!
//! A lazily populated, session-scoped tree of a database server's objects.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        SessionRegistry (create/expand/refresh/find)      │
//! │   node lock ─► connection slot ─► spawned population     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [tree]
//! ┌─────────────────────────────────────────────────────────┐
//! │     TreeNode + ChildCollection + path addressing         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [expansion]
//! ┌─────────────────────────────────────────────────────────┐
//! │   StrategyRegistry: kind → ExpansionStrategy (+filters)  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [backend / worker]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Connector + BindingQueue  (NDJSON metadata worker)     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod expansion;
pub mod session;
pub mod tree;
pub mod worker;

pub use error::{ExplorerError, ExplorerResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::backend::{BindingQueue, BoundConnection, Connector, FindNodesRequest, PathCandidates, TemplatePathGenerator};
    pub use crate::config::{ConnectionParams, Driver, Settings};
    pub use crate::error::{ExplorerError, ExplorerResult};
    pub use crate::expansion::{
        ExpandRequest, ExpansionStrategy, FolderStrategy, NodeFilter, PropertyFilter, StrategyError,
        StrategyRegistry, ValidFor,
    };
    pub use crate::session::{
        ExpandResponse, ExplorerEvent, NodeInfo, SessionCreated, SessionRegistry,
    };
    pub use crate::tree::{ChildDescriptor, NodeDescriptor, NodeKind, ObjectMetadata, TreeNode};
}
