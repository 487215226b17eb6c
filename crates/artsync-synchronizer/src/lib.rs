//! artsync synchronizer
//!
//! The plugin contract that turns declaration files into artefacts and
//! drives their side effects phase by phase.
//!
//! # Core Concepts
//!
//! - [`Synchronizer`]: typed plugin for one artefact type (parse, complete, cleanup)
//! - [`DynSynchronizer`]: object-safe view used by the registry and the engine
//! - [`SynchronizerRegistry`]: ordered set of synchronizers, routes locations by extension
//! - [`SynchronizerCallback`]: per-pass sink for state registrations and errors
//! - [`ArtefactStore`]: persistence collaborator, one store per artefact type
//! - [`RuntimeRegistry`]: process-local listener and role runtime
//!
//! # Architecture
//!
//! ```text
//! declaration ─▶ Synchronizer::parse ─▶ ArtefactStore
//!                                           │
//!             TopologicalDepleter ◀─ run_phase ─▶ complete ─▶ side effect
//!                                           │
//!                                  SynchronizerCallback ─▶ errors
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use artsync_synchronizer::{InMemoryDatabase, RuntimeRegistry, SynchronizerRegistry};
//!
//! let runtime = Arc::new(RuntimeRegistry::new());
//! let registry = SynchronizerRegistry::with_builtin(&runtime, Arc::new(InMemoryDatabase::new()));
//!
//! let table = registry.find_for_path("/db/orders.table").unwrap();
//! assert_eq!(table.artefact_type(), "table");
//! assert!(!registry.accepts("/README.md"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod callback;
mod error;
pub mod kinds;
mod registry;
mod runtime;
mod store;
mod synchronizer;

pub use callback::{PassCallback, StateRecord, SynchronizerCallback};
pub use error::{ParseError, StoreError, SynchronizerError};
pub use kinds::{
    Column, DdlError, DdlExecutor, InMemoryDatabase, Listener, ListenerSynchronizer, Role,
    RoleSynchronizer, Table, TableSynchronizer,
};
pub use registry::SynchronizerRegistry;
pub use runtime::{ListenerKind, ListenerRuntime, RoleRuntime, RuntimeRegistry};
pub use store::{ArtefactStore, InMemoryArtefactStore, StatusSink, StoreSink, SYSTEM_USER};
pub use synchronizer::{drive_phase, DynSynchronizer, PhaseEffects, PhaseOutcome, Synchronizer};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
