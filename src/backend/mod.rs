//! Backend collaborators.
//!
//! The explorer core never talks to a database directly. It consumes three
//! narrow contracts:
//!
//! - [`Connector`] opens and closes backend connections.
//! - [`BindingQueue`] serializes and time-limits use of an open connection.
//! - [`PathCandidates`] turns a find request into plausible node paths.

mod binding;
mod candidates;

use async_trait::async_trait;

use crate::config::ConnectionParams;
use crate::error::ExplorerResult;
use crate::expansion::ValidFor;
use crate::tree::NodeKind;

pub use binding::{BindingQueue, BoundConnection};
pub use candidates::{FindNodesRequest, PathCandidates, TemplatePathGenerator};

/// Opens and closes backend connections for sessions.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Handle to one open backend connection.
    type Connection: Send + Sync + 'static;

    /// Open a connection.
    async fn connect(&self, params: &ConnectionParams) -> ExplorerResult<Self::Connection>;

    /// Release a connection. Called exactly once per successful `connect`.
    async fn disconnect(&self, connection: &Self::Connection);

    /// Value of the session's root node.
    fn server_name(&self, params: &ConnectionParams) -> String {
        params.server.clone()
    }

    /// Platform used to narrow strategy filters.
    fn platform(&self, params: &ConnectionParams, _connection: &Self::Connection) -> ValidFor {
        params.driver.default_platform()
    }

    /// Whether system objects are listed under nodes of `kind`.
    fn include_system_objects(&self, _params: &ConnectionParams, _kind: NodeKind) -> bool {
        true
    }
}
