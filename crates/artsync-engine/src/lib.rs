//! artsync engine
//!
//! Reconciliation passes that drive runtime state into agreement with the
//! declaration files of each tenant.
//!
//! # Core Concepts
//!
//! - [`ReconciliationDriver`]: one tenant, one pass at a time
//! - [`MultitenantReconciler`]: one driver per tenant, isolated from each other
//! - [`DefinitionSource`]: where declaration files come from
//! - [`DefinitionStore`]: per-file checksum and processing state
//! - [`PassReport`]: what a pass did and every error it recorded
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use artsync_engine::{InMemoryDefinitionSource, ReconciliationDriver};
//! use artsync_synchronizer::{InMemoryDatabase, RuntimeRegistry, SynchronizerRegistry};
//!
//! let runtime = Arc::new(RuntimeRegistry::new());
//! let registry = SynchronizerRegistry::with_builtin(&runtime, Arc::new(InMemoryDatabase::new()));
//!
//! let source = InMemoryDefinitionSource::new();
//! source.put("/app/orders.listener", r#"{"name": "orders", "handler": "h", "kind": "queue"}"#);
//!
//! let driver = ReconciliationDriver::new("default", registry, source);
//! let report = driver.reconcile().unwrap();
//! assert!(report.is_clean());
//! assert!(runtime.is_running("orders"));
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
mod definition;
mod driver;
mod error;
pub mod logging;
mod report;
mod source;
mod tenant;

pub use config::{EngineConfig, LogFormat, TenantConfig};
pub use definition::{Definition, DefinitionDecision, DefinitionState, DefinitionStore};
pub use driver::ReconciliationDriver;
pub use error::{ConfigError, ReconcileError};
pub use report::PassReport;
pub use source::{DefinitionFile, DefinitionSource, FsDefinitionSource, InMemoryDefinitionSource};
pub use tenant::{builtin_driver, MultitenantReconciler, TenantReports};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
