//! Sessions and the request orchestrator.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ SessionRegistry<B: Connector>                                │
//! │  ├─ sessions: DashMap<id, Arc<Session>>                      │
//! │  ├─ strategies: StrategyRegistry<B::Connection>              │
//! │  └─ candidates: PathCandidates (find)                        │
//! └──────────────────────────────────────────────────────────────┘
//!            │ create / expand / refresh / close / find
//!            ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Session                                                      │
//! │  ├─ id: sha256(connection params)                            │
//! │  ├─ root: Arc<TreeNode>                                      │
//! │  ├─ binding: BindingQueue<Connection>                        │
//! │  └─ state: Creating → Active → Closing → Removed             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod entity;
mod id;
mod registry;
mod snapshot;

pub use entity::{Session, SessionState};
pub use id::{compute_hash, session_id_for};
pub use registry::{SessionRegistry, SessionRegistryBuilder, Timeouts};
pub use snapshot::{ExpandResponse, ExplorerEvent, NodeInfo, SessionCreated};
