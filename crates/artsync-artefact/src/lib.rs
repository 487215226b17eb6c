//! artsync artefact model
//!
//! Identity-bearing, file-declared artefacts and the two orthogonal axes that
//! describe where each one stands.
//!
//! # Core Concepts
//!
//! - [`Artefact`]: common record (location, name, type, derived key, dependencies)
//! - [`ArtefactKey`]: `type:location:name`, unique across a reconciliation universe
//! - [`ArtefactLifecycle`]: the transition being driven (NEW, MODIFIED, CREATED, ...)
//! - [`ArtefactState`]: outcome of the last attempt (SUCCESSFUL_*, FAILED_*, FATAL, ...)
//! - [`ArtefactPhase`]: the step a pass drives (CREATE, UPDATE, DELETE, START, STOP)
//! - [`Artefactual`]: trait for typed artefacts embedding the common record
//!
//! # Example
//!
//! ```rust
//! use artsync_artefact::{Artefact, ArtefactLifecycle, ArtefactState};
//!
//! let mut table = Artefact::new("table", "/shop/orders.table", "ORDERS").unwrap();
//! assert_eq!(table.key().as_str(), "table:/shop/orders.table:ORDERS");
//!
//! table
//!     .transition(ArtefactLifecycle::Created, ArtefactState::SuccessfulCreate, None)
//!     .unwrap();
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artefact;
mod checksum;
mod error;
mod lifecycle;
pub mod state_machine;

pub use artefact::{Artefact, ArtefactKey, Artefactual, AuditInfo};
pub use checksum::{Checksum, ChecksumError};
pub use error::ArtefactError;
pub use lifecycle::{ArtefactLifecycle, ArtefactPhase, ArtefactState, UnknownVariant};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
