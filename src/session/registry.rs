//! Session registry and request orchestration.
//!
//! The registry owns every session and runs the expand protocol:
//!
//! 1. resolve the node among already-populated children
//! 2. take the node's population lock (bounded)
//! 3. borrow the session's connection slot (bounded by the remaining time)
//! 4. populate in a spawned task that owns the lock and the slot
//!
//! A caller that gives up waiting only abandons the response. The spawned
//! task finishes on its own and releases the lock and slot when it does.

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::entity::{Session, SessionState};
use super::id::session_id_for;
use super::snapshot::{ExpandResponse, ExplorerEvent, NodeInfo, SessionCreated};
use crate::backend::{Connector, FindNodesRequest, PathCandidates, TemplatePathGenerator};
use crate::config::{ConnectionParams, ExplorerSettings};
use crate::error::{ExplorerError, ExplorerResult};
use crate::expansion::{PopulateContext, StrategyRegistry};
use crate::tree::{self, path, NodeExpander, NodeKind, ObjectMetadata, TreeNode};

type SharedSession<B> = Arc<Session<<B as Connector>::Connection>>;

/// Deadlines applied by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create_session: Duration,
    pub expand: Duration,
    pub close: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::from(&ExplorerSettings::default())
    }
}

impl From<&ExplorerSettings> for Timeouts {
    fn from(settings: &ExplorerSettings) -> Self {
        Self {
            create_session: settings.create_session_timeout(),
            expand: settings.expand_timeout(),
            close: settings.close_timeout(),
        }
    }
}

/// Owns all sessions of one backend.
pub struct SessionRegistry<B: Connector> {
    inner: Arc<Inner<B>>,
}

impl<B: Connector> Clone for SessionRegistry<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<B: Connector> {
    connector: B,
    strategies: StrategyRegistry<B::Connection>,
    candidates: Box<dyn PathCandidates>,
    sessions: DashMap<String, SharedSession<B>>,
    timeouts: Timeouts,
    events: Option<mpsc::UnboundedSender<ExplorerEvent>>,
}

/// Builder for [`SessionRegistry`].
pub struct SessionRegistryBuilder<B: Connector> {
    connector: B,
    strategies: StrategyRegistry<B::Connection>,
    candidates: Option<Box<dyn PathCandidates>>,
    timeouts: Timeouts,
}

impl<B: Connector> SessionRegistryBuilder<B> {
    pub fn strategies(mut self, strategies: StrategyRegistry<B::Connection>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Path-candidate generator for find requests. Defaults to the built-in
    /// templates.
    pub fn candidates(mut self, candidates: impl PathCandidates + 'static) -> Self {
        self.candidates = Some(Box::new(candidates));
        self
    }

    pub fn settings(mut self, settings: &ExplorerSettings) -> Self {
        self.timeouts = Timeouts::from(settings);
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn create_session_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.create_session = timeout;
        self
    }

    pub fn expand_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.expand = timeout;
        self
    }

    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.close = timeout;
        self
    }

    pub fn build(self) -> SessionRegistry<B> {
        self.finish(None)
    }

    /// Build a registry that reports on the returned channel.
    pub fn build_with_events(self) -> (SessionRegistry<B>, mpsc::UnboundedReceiver<ExplorerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.finish(Some(tx)), rx)
    }

    fn finish(self, events: Option<mpsc::UnboundedSender<ExplorerEvent>>) -> SessionRegistry<B> {
        let candidates = self
            .candidates
            .unwrap_or_else(|| Box::new(TemplatePathGenerator::with_defaults()));

        SessionRegistry {
            inner: Arc::new(Inner {
                connector: self.connector,
                strategies: self.strategies,
                candidates,
                sessions: DashMap::new(),
                timeouts: self.timeouts,
                events,
            }),
        }
    }
}

impl<B: Connector> SessionRegistry<B> {
    pub fn builder(connector: B) -> SessionRegistryBuilder<B> {
        SessionRegistryBuilder {
            connector,
            strategies: StrategyRegistry::new(),
            candidates: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        self.inner.timeouts
    }

    pub fn connector(&self) -> &B {
        &self.inner.connector
    }

    /// The active session with this id.
    pub fn session(&self, session_id: &str) -> Option<SharedSession<B>> {
        self.inner.active_session(session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.inner.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.sessions.is_empty()
    }

    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Open a session, or return the active one with the same parameters.
    ///
    /// Connecting runs in a spawned task. If the deadline passes first the
    /// caller gets a timeout, but the task still registers the session when
    /// it completes so the connection is not orphaned.
    pub async fn create_session(&self, params: ConnectionParams) -> ExplorerResult<SessionCreated> {
        let session_id = session_id_for(&params)?;

        if let Some(existing) = self.inner.active_session(&session_id) {
            tracing::debug!(session_id = %session_id, "reusing active session");
            return Ok(self.inner.created(&existing, true));
        }

        let timeout = self.inner.timeouts.create_session;
        let task = tokio::spawn(self.inner.clone().open_session(session_id.clone(), params));

        let outcome = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ExplorerError::from(join)),
            Err(_) => Err(ExplorerError::timeout("session creation", timeout)),
        };

        match outcome {
            Ok((session, reused)) => Ok(self.inner.created(&session, reused)),
            Err(err) => {
                tracing::warn!(session_id = %session_id, error = %err, "session creation failed");
                self.inner.emit(ExplorerEvent::SessionCreated {
                    session_id,
                    success: false,
                    root_node: None,
                    error_message: Some(err.to_string()),
                });
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Expand / refresh
    // ------------------------------------------------------------------

    /// Children of the node at `node_path`, populating it if needed.
    ///
    /// Never fails: unknown sessions and paths yield an empty response, and
    /// timeouts yield the node's current children with a message.
    pub async fn expand(&self, session_id: &str, node_path: &str, force_refresh: bool) -> ExpandResponse {
        self.expand_with_filter(session_id, node_path, force_refresh, None)
            .await
    }

    /// Repopulate the node at `node_path`.
    pub async fn refresh(&self, session_id: &str, node_path: &str) -> ExpandResponse {
        self.expand(session_id, node_path, true).await
    }

    /// [`expand`](Self::expand) restricted to children whose name contains
    /// `name_filter` (case-insensitive).
    pub async fn expand_with_filter(
        &self,
        session_id: &str,
        node_path: &str,
        force_refresh: bool,
        name_filter: Option<&str>,
    ) -> ExpandResponse {
        let Some(session) = self.inner.active_session(session_id) else {
            tracing::debug!(session_id, path = node_path, "expand for unknown session");
            return ExpandResponse::empty(session_id, node_path);
        };
        let Some(node) = tree::find_node(session.root(), node_path) else {
            tracing::debug!(session_id, path = node_path, "expand for unknown path");
            return ExpandResponse::empty(session_id, node_path);
        };

        let response = self
            .inner
            .expand_node(&session, &node, force_refresh, name_filter)
            .await;
        self.inner
            .emit(ExplorerEvent::ExpandCompleted(response.clone()));
        response
    }

    // ------------------------------------------------------------------
    // Close
    // ------------------------------------------------------------------

    /// Remove a session and release its connection. Unknown ids succeed.
    ///
    /// The session leaves the map first, so concurrent expands see it as
    /// unknown. In-flight populations are cancelled and given
    /// `close_timeout` to hand back the connection before it is released.
    pub async fn close_session(&self, session_id: &str) -> bool {
        let Some((_, session)) = self.inner.sessions.remove(session_id) else {
            tracing::debug!(session_id, "close for unknown session");
            return true;
        };

        session.set_state(SessionState::Closing);
        session.cancel();

        let timeout = self.inner.timeouts.close;
        if !session.binding().drain(timeout).await {
            tracing::warn!(
                session_id,
                timeout = ?timeout,
                "in-flight expansions did not finish before close"
            );
        }
        session.binding().close();

        self.inner.release(&session).await;
        session.set_state(SessionState::Removed);
        tracing::info!(session_id, "session closed");
        self.inner.emit(ExplorerEvent::SessionClosed {
            session_id: session_id.to_string(),
        });
        true
    }

    /// Close every session concurrently.
    pub async fn shutdown(&self) {
        let ids = self.session_ids();
        let closes = ids.iter().map(|id| self.close_session(id));
        futures::future::join_all(closes).await;
    }

    // ------------------------------------------------------------------
    // Find
    // ------------------------------------------------------------------

    /// Nodes matching a find request, expanding the tree along candidate
    /// paths as needed. Unknown kinds and sessions find nothing.
    pub async fn find_nodes(&self, request: &FindNodesRequest) -> Vec<NodeInfo> {
        let kind = match NodeKind::from_str(&request.kind) {
            Ok(kind) => kind,
            Err(err) => {
                tracing::debug!(error = %err, "find for unknown kind");
                return Vec::new();
            }
        };
        let Some(session) = self.inner.active_session(&request.session_id) else {
            tracing::debug!(session_id = %request.session_id, "find for unknown session");
            return Vec::new();
        };

        let root = session.root().clone();
        let root_path = root.path();
        let expander = SessionExpander {
            inner: self.inner.clone(),
            session: session.clone(),
        };

        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for relative in self.inner.candidates.candidates(kind, request) {
            let target = path::join(&root_path, &relative);
            let Some(node) = tree::resolve(&root, &target, Some(&expander)).await else {
                continue;
            };
            if node.kind() == kind && seen.insert(node.path()) {
                found.push(NodeInfo::from_node(&node));
            }
        }

        tracing::debug!(
            session_id = %request.session_id,
            kind = %kind,
            found = found.len(),
            "find completed"
        );
        found
    }
}

impl<B: Connector> Inner<B> {
    fn active_session(&self, session_id: &str) -> Option<SharedSession<B>> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .filter(|session| session.is_active())
    }

    fn emit(&self, event: ExplorerEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is listening.
            let _ = events.send(event);
        }
    }

    fn created(&self, session: &SharedSession<B>, reused: bool) -> SessionCreated {
        let root_node = NodeInfo::from_node(session.root());
        self.emit(ExplorerEvent::SessionCreated {
            session_id: session.id().to_string(),
            success: true,
            root_node: Some(root_node.clone()),
            error_message: None,
        });
        SessionCreated {
            session_id: session.id().to_string(),
            root_node,
            reused,
        }
    }

    /// Connect, build the root and register. Returns the registered session
    /// and whether it already existed.
    async fn open_session(
        self: Arc<Self>,
        session_id: String,
        params: ConnectionParams,
    ) -> ExplorerResult<(SharedSession<B>, bool)> {
        let connection = self.connector.connect(&params).await?;

        let server_name = self.connector.server_name(&params);
        let platform = self.connector.platform(&params, &connection);
        let root = TreeNode::root(
            server_name.clone(),
            Some(ObjectMetadata::new("Server", server_name)),
        );
        let session = Arc::new(Session::new(session_id.clone(), params, root, connection, platform));

        let existing = match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(entry) => Some(entry.get().clone()),
            Entry::Vacant(entry) => {
                session.set_state(SessionState::Active);
                entry.insert(session.clone());
                None
            }
        };

        if let Some(existing) = existing {
            tracing::debug!(session_id = %session_id, "session opened concurrently, dropping duplicate");
            self.release(&session).await;
            session.set_state(SessionState::Removed);
            return Ok((existing, true));
        }

        tracing::info!(session_id = %session_id, server = %session.params().server, "session created");
        Ok((session, false))
    }

    /// Disconnect once, however many paths reach here.
    async fn release(&self, session: &Session<B::Connection>) {
        if session.mark_released() {
            self.connector
                .disconnect(session.binding().connection())
                .await;
        }
    }

    async fn expand_node(
        self: &Arc<Self>,
        session: &SharedSession<B>,
        node: &Arc<TreeNode>,
        refresh: bool,
        name_filter: Option<&str>,
    ) -> ExpandResponse {
        let node_path = node.path();
        let (children, failure) = match self.populate(session, node, refresh, name_filter).await {
            Ok(children) => (children, None),
            Err(err) => {
                tracing::warn!(
                    session_id = %session.id(),
                    path = %node_path,
                    error = %err,
                    "expand degraded to current children"
                );
                (node.children(), Some(err.to_string()))
            }
        };

        let error_message = match (node.error_message(), failure) {
            (Some(strategy), Some(failure)) => Some(format!("{}\n{}", strategy, failure)),
            (strategy, failure) => strategy.or(failure),
        };
        session.set_last_error(error_message.clone());

        ExpandResponse {
            session_id: session.id().to_string(),
            node_path,
            nodes: children.iter().map(|child| NodeInfo::from_node(child)).collect(),
            error_message,
        }
    }

    /// Run the locked, bounded population of one node.
    async fn populate(
        self: &Arc<Self>,
        session: &SharedSession<B>,
        node: &Arc<TreeNode>,
        refresh: bool,
        name_filter: Option<&str>,
    ) -> ExplorerResult<Vec<Arc<TreeNode>>> {
        if node.is_leaf() {
            return Ok(Vec::new());
        }

        let timeout = self.timeouts.expand;
        let deadline = Instant::now() + timeout;

        let lock = node.population_lock();
        let guard = tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| ExplorerError::timeout("node lock", timeout))?;

        // Whoever held the lock may have just populated this node.
        if !refresh && node.has_reusable_children(name_filter) {
            return Ok(node.children());
        }

        let bound = session
            .binding()
            .acquire(deadline.saturating_duration_since(Instant::now()))
            .await?;

        let inner = self.clone();
        let session_task = session.clone();
        let node_task = node.clone();
        let filter = name_filter.map(str::to_string);
        let cancel = session.population_token();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            let _guard = guard;
            let ctx = PopulateContext {
                strategies: &inner.strategies,
                connection: &*bound,
                platform: session_task.platform(),
                include_system_objects: inner
                    .connector
                    .include_system_objects(session_task.params(), node_task.kind()),
            };
            if refresh {
                node_task.refresh(&ctx, filter.as_deref(), &task_cancel).await
            } else {
                node_task.expand(&ctx, filter.as_deref(), &task_cancel).await
            }
        });

        match tokio::time::timeout_at(deadline, task).await {
            Ok(Ok(_)) if cancel.is_cancelled() => {
                Err(ExplorerError::SessionClosed(session.id().to_string()))
            }
            Ok(Ok(children)) => Ok(children),
            Ok(Err(join)) => Err(ExplorerError::from(join)),
            Err(_) => Err(ExplorerError::timeout("expand", timeout)),
        }
    }
}

/// Expands nodes for path resolution through the full locking protocol.
struct SessionExpander<B: Connector> {
    inner: Arc<Inner<B>>,
    session: SharedSession<B>,
}

#[async_trait]
impl<B: Connector> NodeExpander for SessionExpander<B> {
    async fn expand_node(&self, node: &Arc<TreeNode>) -> Vec<Arc<TreeNode>> {
        match self.inner.populate(&self.session, node, false, None).await {
            Ok(children) => children,
            Err(err) => {
                tracing::debug!(
                    session_id = %self.session.id(),
                    path = %node.path(),
                    error = %err,
                    "find could not expand node"
                );
                node.children()
            }
        }
    }
}
