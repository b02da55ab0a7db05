use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    error::QueryError,
    tree::{StateQuery, StateTree, StateView},
};

/// Read-only access to the state tree.
///
/// Every call copies what it returns while holding the tree only briefly, so the result is a
/// point-in-time view that later updates do not alter.
pub trait StateReader: Send + Sync + 'static {
    /// Returns a copy of the whole tree.
    fn snapshot(&self) -> StateTree;

    /// Returns a copy of the part of the tree selected by `query`.
    fn query(&self, query: &StateQuery) -> Result<StateView, QueryError>;
}

#[derive(Debug)]
pub(crate) struct StateTreeManager {
    tree: RwLock<StateTree>,
}

impl StateTreeManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            tree: RwLock::new(StateTree::new()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, StateTree> {
        self.tree
            .read()
            .expect("`StateTreeManager` lock can't be poisoned")
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, StateTree> {
        self.tree
            .write()
            .expect("`StateTreeManager` lock can't be poisoned")
    }
}

impl StateReader for StateTreeManager {
    fn snapshot(&self) -> StateTree {
        self.read().clone()
    }

    fn query(&self, query: &StateQuery) -> Result<StateView, QueryError> {
        self.read().query(query)
    }
}
