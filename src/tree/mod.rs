//! The object tree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ TreeNode (server)                                             │
//! │  ├─ identity: value, path_name, kind, sub_type, priority      │
//! │  ├─ parent: Weak<TreeNode>  (path computation only)           │
//! │  └─ children: ChildCollection                                 │
//! │        state: Uninitialized → Populating → Initialized        │
//! │        items: Vec<Arc<TreeNode>>  (sorted once initialized)   │
//! └──────────────────────────────────────────────────────────────┘
//!                          │ expand / refresh
//!                          ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ StrategyRegistry: kind → [ExpansionStrategy, ...]             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod children;
mod descriptor;
mod kind;
mod node;
pub mod path;

use std::sync::{Mutex, MutexGuard};

pub use children::{ChildCollection, PopulationState};
pub use descriptor::{ChildDescriptor, LineageEntry, NodeDescriptor, ObjectMetadata};
pub use kind::{NodeKind, UnknownKind};
pub use node::TreeNode;
pub use path::{find_node, node_path, resolve, NodeExpander, PATH_SEPARATOR};

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
