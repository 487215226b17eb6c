//! artsync topology
//!
//! Dependency-aware processing of artefact batches.
//!
//! # Core Concepts
//!
//! - [`TopologyWrapper`]: batch-scoped node resolving an artefact's dependency keys
//! - [`TopologicalSorter`]: petgraph pre-sort with cycle reporting
//! - [`TopologicalDepleter`]: fixed-point sweep completing ready wrappers for one phase
//! - [`CompletionOutcome`]: `Completed | Failed | Blocked` result of one attempt
//!
//! # Example
//!
//! ```rust
//! use artsync_artefact::{Artefact, ArtefactPhase};
//! use artsync_topology::{CompletionOutcome, TopologicalDepleter, TopologyWrapper};
//!
//! let a = Artefact::new("table", "/a.table", "A").unwrap();
//! let b = Artefact::new("table", "/b.table", "B")
//!     .unwrap()
//!     .with_dependencies(["table:/a.table:A"]);
//!
//! let batch = TopologyWrapper::wrap_all([b, a]);
//! let depletion = TopologicalDepleter::new().deplete(
//!     batch,
//!     ArtefactPhase::Create,
//!     &mut |_: &mut TopologyWrapper<Artefact>, _: ArtefactPhase| CompletionOutcome::Completed,
//! );
//! assert!(depletion.is_complete());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod depleter;
mod outcome;
mod sorter;
mod wrapper;

pub use depleter::{Depletion, TopologicalDepleter};
pub use outcome::{Completer, CompletionOutcome};
pub use sorter::{SortedBatch, TopologicalSorter};
pub use wrapper::TopologyWrapper;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
