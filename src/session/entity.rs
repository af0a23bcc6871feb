//! The session entity.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::backend::BindingQueue;
use crate::config::ConnectionParams;
use crate::expansion::ValidFor;
use crate::tree::TreeNode;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Creating,
    Active,
    Closing,
    Removed,
}

/// One root tree bound to one backend connection.
pub struct Session<C> {
    id: String,
    params: ConnectionParams,
    root: Arc<TreeNode>,
    binding: BindingQueue<C>,
    platform: ValidFor,
    state: Mutex<SessionState>,
    /// Parent of every population token handed out for this session.
    cancel: CancellationToken,
    released: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl<C> Session<C> {
    pub(crate) fn new(
        id: String,
        params: ConnectionParams,
        root: Arc<TreeNode>,
        connection: C,
        platform: ValidFor,
    ) -> Self {
        Self {
            id,
            params,
            root,
            binding: BindingQueue::new(connection),
            platform,
            state: Mutex::new(SessionState::Creating),
            cancel: CancellationToken::new(),
            released: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn root(&self) -> &Arc<TreeNode> {
        &self.root
    }

    pub fn binding(&self) -> &BindingQueue<C> {
        &self.binding
    }

    pub fn platform(&self) -> ValidFor {
        self.platform
    }

    pub fn state(&self) -> SessionState {
        *crate::tree::lock(&self.state)
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        *crate::tree::lock(&self.state) = state;
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Token for one population. Cancelled when the session closes.
    pub(crate) fn population_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    /// Signal every in-flight population to stop.
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Claim the right to disconnect. Only the first caller gets `true`.
    pub(crate) fn mark_released(&self) -> bool {
        !self.released.swap(true, Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        crate::tree::lock(&self.last_error).clone()
    }

    pub(crate) fn set_last_error(&self, message: Option<String>) {
        *crate::tree::lock(&self.last_error) = message;
    }
}

impl<C> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("server", &self.params.server)
            .field("state", &self.state())
            .field("released", &self.is_released())
            .finish()
    }
}
