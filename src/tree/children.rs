//! Ordered child collection with a population lifecycle.
//!
//! ```text
//!   Uninitialized ──begin_init──▶ Populating ──end_init (depth 0)──▶ Initialized
//!         ▲                           │                                   │
//!         └────────abort_init─────────┘◀────────────begin_init────────────┘
//! ```
//!
//! `begin_init`/`end_init` nest; only the outermost `end_init` sorts and
//! commits. While populating, insertions go to a staging list and readers
//! keep seeing the last committed children. The outermost `end_init` swaps
//! the sorted staging list in; `abort_init` drops it and restores the state
//! the population started from. Once initialized, every insertion lands at
//! its sorted position.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use super::lock;
use super::node::TreeNode;

/// Population state of a child collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopulationState {
    Uninitialized,
    Populating,
    Initialized,
}

#[derive(Debug)]
struct Inner {
    /// Committed children, always what readers see.
    items: Vec<Arc<TreeNode>>,
    /// Children of the population in flight.
    staging: Vec<Arc<TreeNode>>,
    state: PopulationState,
    /// State to return to if the population in flight aborts.
    resume: PopulationState,
    depth: u32,
}

impl Inner {
    fn enter(&mut self, fresh: bool) {
        if self.depth == 0 {
            self.resume = self.state;
            self.staging = if fresh { Vec::new() } else { self.items.clone() };
        }
        self.depth += 1;
        self.state = PopulationState::Populating;
    }
}

/// Children of a tree node.
#[derive(Debug)]
pub struct ChildCollection {
    inner: Mutex<Inner>,
}

impl Default for ChildCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl ChildCollection {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: Vec::new(),
                staging: Vec::new(),
                state: PopulationState::Uninitialized,
                resume: PopulationState::Uninitialized,
                depth: 0,
            }),
        }
    }

    pub fn state(&self) -> PopulationState {
        lock(&self.inner).state
    }

    pub fn is_populating(&self) -> bool {
        self.state() == PopulationState::Populating
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == PopulationState::Initialized
    }

    /// Current nesting depth of `begin_init` calls.
    pub fn depth(&self) -> u32 {
        lock(&self.inner).depth
    }

    /// Enter (or nest into) the populating state. An outermost call stages
    /// on top of the committed children.
    pub fn begin_init(&self) {
        lock(&self.inner).enter(false);
    }

    /// Start a fresh population at depth one, staging from empty. Returns
    /// `false` without touching anything if a population is already in
    /// flight. The committed children stay visible until the commit.
    pub fn begin_population(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.state == PopulationState::Populating {
            return false;
        }
        inner.enter(true);
        true
    }

    /// Leave one nesting level. The outermost call sorts and commits,
    /// detaching committed children the population did not keep.
    pub fn end_init(&self) {
        let replaced = {
            let mut inner = lock(&self.inner);
            if inner.depth == 0 {
                return;
            }
            inner.depth -= 1;
            if inner.depth > 0 {
                return;
            }
            let mut staged = std::mem::take(&mut inner.staging);
            staged.sort_by(|a, b| a.compare_to(b));
            inner.state = PopulationState::Initialized;
            let replaced = std::mem::replace(&mut inner.items, staged);
            without(replaced, &inner.items)
        };
        for child in replaced {
            child.clear_parent();
        }
    }

    /// Leave one nesting level without committing. The outermost call drops
    /// anything staged so far and restores the previous state and children.
    pub fn abort_init(&self) {
        let dropped = {
            let mut inner = lock(&self.inner);
            if inner.depth == 0 {
                return;
            }
            inner.depth -= 1;
            if inner.depth > 0 {
                return;
            }
            inner.state = inner.resume;
            let staged = std::mem::take(&mut inner.staging);
            without(staged, &inner.items)
        };
        for child in dropped {
            child.clear_parent();
        }
    }

    /// Insert a child. The caller is responsible for setting its parent.
    pub fn add(&self, child: Arc<TreeNode>) {
        let mut inner = lock(&self.inner);
        match inner.state {
            PopulationState::Initialized => {
                let idx = inner
                    .items
                    .partition_point(|existing| existing.compare_to(&child) != Ordering::Greater);
                inner.items.insert(idx, child);
            }
            PopulationState::Populating => inner.staging.push(child),
            PopulationState::Uninitialized => inner.items.push(child),
        }
    }

    /// Remove a child by identity, detaching it from the tree.
    pub fn remove(&self, child: &Arc<TreeNode>) -> bool {
        let removed = {
            let mut inner = lock(&self.inner);
            let committed = take_out(&mut inner.items, child);
            let staged = take_out(&mut inner.staging, child);
            committed.or(staged)
        };
        match removed {
            Some(node) => {
                node.clear_parent();
                true
            }
            None => false,
        }
    }

    /// Remove every child, committed and staged, detaching each one.
    pub fn clear(&self) {
        let detached = {
            let mut inner = lock(&self.inner);
            let mut detached = std::mem::take(&mut inner.items);
            let staged = std::mem::take(&mut inner.staging);
            let extra = without(staged, &detached);
            detached.extend(extra);
            detached
        };
        for child in detached {
            child.clear_parent();
        }
    }

    /// Snapshot of the committed children.
    pub fn snapshot(&self) -> Vec<Arc<TreeNode>> {
        lock(&self.inner).items.clone()
    }

    /// Every attached child, committed or staged.
    pub(crate) fn attached(&self) -> Vec<Arc<TreeNode>> {
        let inner = lock(&self.inner);
        let mut all = inner.items.clone();
        all.extend(without(inner.staging.clone(), &inner.items));
        all
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.inner).items.is_empty()
    }
}

/// `nodes` minus anything in `keep`, by identity.
fn without(nodes: Vec<Arc<TreeNode>>, keep: &[Arc<TreeNode>]) -> Vec<Arc<TreeNode>> {
    nodes
        .into_iter()
        .filter(|node| !keep.iter().any(|kept| Arc::ptr_eq(kept, node)))
        .collect()
}

fn take_out(items: &mut Vec<Arc<TreeNode>>, child: &Arc<TreeNode>) -> Option<Arc<TreeNode>> {
    items
        .iter()
        .position(|existing| Arc::ptr_eq(existing, child))
        .map(|idx| items.remove(idx))
}
