//! Worker communication module.
//!
//! This module provides async communication with the metadata worker
//! process. The worker owns every database driver and answers metadata
//! requests, while the explorer itself stays database-agnostic.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Object Explorer (Rust + Tokio)                  │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │  WorkerConnector / WorkerStrategy                         │  │
//! │  │                              │                            │  │
//! │  │  WorkerClient (Async)        ▼                            │  │
//! │  │  - Spawns the worker as child process                     │  │
//! │  │  - NDJSON protocol over stdin/stdout                      │  │
//! │  │  - Request IDs for concurrent request correlation         │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                              │                                   │
//! │               stdin (NDJSON) │ stdout (NDJSON)                  │
//! │                              ▼                                   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │         Metadata Worker (Long-Running Child Process)            │
//! │  session.connect / session.disconnect / explorer.list_children  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use object_explorer::session::SessionRegistry;
//! use object_explorer::worker::{default_strategies, WorkerClient, WorkerConnector};
//!
//! let client = Arc::new(WorkerClient::spawn("./explorer-worker").await?);
//! let registry = SessionRegistry::builder(WorkerConnector::new(client))
//!     .strategies(default_strategies())
//!     .build();
//! ```

mod client;
mod connector;
mod error;
pub mod protocol;
mod strategy;

pub use client::WorkerClient;
pub use connector::{WorkerConnection, WorkerConnector, INCLUDE_SYSTEM_OBJECTS_OPTION};
pub use error::{WorkerError, WorkerResult};
pub use strategy::{default_strategies, WorkerStrategy};
