//! Kind-keyed strategy registry.

use std::collections::HashMap;
use std::sync::Arc;

use super::ExpansionStrategy;
use crate::tree::NodeKind;

/// Maps each parent kind to its strategies, in registration order.
pub struct StrategyRegistry<C> {
    by_kind: HashMap<NodeKind, Vec<Arc<dyn ExpansionStrategy<C>>>>,
}

impl<C> Default for StrategyRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> StrategyRegistry<C> {
    pub fn new() -> Self {
        Self {
            by_kind: HashMap::new(),
        }
    }

    /// Register a strategy for every parent kind it supports.
    pub fn register(&mut self, strategy: impl ExpansionStrategy<C> + 'static) -> &mut Self {
        self.register_shared(Arc::new(strategy))
    }

    pub fn register_shared(&mut self, strategy: Arc<dyn ExpansionStrategy<C>>) -> &mut Self {
        for kind in strategy.supported_parents() {
            self.by_kind
                .entry(*kind)
                .or_default()
                .push(strategy.clone());
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, strategy: impl ExpansionStrategy<C> + 'static) -> Self {
        self.register(strategy);
        self
    }

    /// Strategies applicable to a parent kind.
    pub fn applicable(&self, kind: NodeKind) -> Vec<Arc<dyn ExpansionStrategy<C>>> {
        self.by_kind.get(&kind).cloned().unwrap_or_default()
    }

    /// Whether any strategy can populate this kind.
    pub fn supports(&self, kind: NodeKind) -> bool {
        self.by_kind.get(&kind).is_some_and(|s| !s.is_empty())
    }
}
