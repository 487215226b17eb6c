//! Built-in artefact kinds
//!
//! - [`TableSynchronizer`]: `.table` declarations, DDL through a [`DdlExecutor`]
//! - [`RoleSynchronizer`]: `.roles` declarations, several roles per file
//! - [`ListenerSynchronizer`]: `.listener` declarations, queue/topic consumers

use crate::registry::SynchronizerRegistry;
use crate::runtime::RuntimeRegistry;
use crate::store::InMemoryArtefactStore;
use std::sync::Arc;

mod listener;
mod role;
mod table;

pub use listener::{Listener, ListenerSynchronizer};
pub use role::{Role, RoleSynchronizer};
pub use table::{Column, DdlError, DdlExecutor, InMemoryDatabase, Table, TableSynchronizer};

impl SynchronizerRegistry {
    /// Registry with the built-in kinds, each backed by a fresh in-memory store
    #[must_use]
    pub fn with_builtin(runtime: &Arc<RuntimeRegistry>, database: Arc<dyn DdlExecutor>) -> Self {
        let mut registry = Self::new();
        registry.register(TableSynchronizer::new(
            Arc::new(InMemoryArtefactStore::<Table>::new()),
            database,
        ));
        registry.register(RoleSynchronizer::new(
            Arc::new(InMemoryArtefactStore::<Role>::new()),
            Arc::clone(runtime),
        ));
        registry.register(ListenerSynchronizer::new(
            Arc::new(InMemoryArtefactStore::<Listener>::new()),
            Arc::clone(runtime),
        ));
        registry
    }
}
