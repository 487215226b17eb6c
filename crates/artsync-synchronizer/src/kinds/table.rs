//! Database table artefacts (`.table`)
//!
//! Side effects are DDL statements issued through a [`DdlExecutor`]. UPDATE
//! is a full drop-then-create, never a differential migration.

use crate::callback::SynchronizerCallback;
use crate::error::{ParseError, SynchronizerError};
use crate::store::ArtefactStore;
use crate::synchronizer::{drive_phase, PhaseEffects, Synchronizer};
use artsync_artefact::{Artefact, ArtefactPhase, Artefactual};
use artsync_topology::{CompletionOutcome, TopologyWrapper};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Column of a declared table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default = "nullable_default")]
    pub nullable: bool,
}

fn nullable_default() -> bool {
    true
}

/// Errors from the DDL collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DdlError {
    #[error("table {0} already exists")]
    AlreadyExists(String),

    #[error("table {0} does not exist")]
    NotFound(String),

    #[error("invalid definition: {0}")]
    InvalidDefinition(String),

    #[error("database unavailable: {0}")]
    Unavailable(String),
}

impl From<DdlError> for SynchronizerError {
    fn from(err: DdlError) -> Self {
        match err {
            DdlError::Unavailable(_) | DdlError::AlreadyExists(_) | DdlError::NotFound(_) => {
                Self::runtime(err.to_string())
            }
            DdlError::InvalidDefinition(_) => Self::invalid(err.to_string()),
        }
    }
}

/// Executes table DDL against a database
#[cfg_attr(test, mockall::automock)]
pub trait DdlExecutor: Send + Sync {
    fn table_exists(&self, name: &str) -> Result<bool, DdlError>;

    fn create_table(&self, name: &str, columns: &[Column]) -> Result<(), DdlError>;

    fn drop_table(&self, name: &str) -> Result<(), DdlError>;
}

/// Schema held in memory
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    tables: RwLock<IndexMap<String, Vec<Column>>>,
    offline: AtomicBool,
}

impl InMemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every statement fails with [`DdlError::Unavailable`]
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    #[must_use]
    pub fn columns(&self, table: &str) -> Option<Vec<Column>> {
        self.tables.read().get(table).cloned()
    }

    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    fn check(&self) -> Result<(), DdlError> {
        if self.offline.load(Ordering::Relaxed) {
            Err(DdlError::Unavailable("in-memory database offline".into()))
        } else {
            Ok(())
        }
    }
}

impl DdlExecutor for InMemoryDatabase {
    fn table_exists(&self, name: &str) -> Result<bool, DdlError> {
        self.check()?;
        Ok(self.tables.read().contains_key(name))
    }

    fn create_table(&self, name: &str, columns: &[Column]) -> Result<(), DdlError> {
        self.check()?;
        let mut tables = self.tables.write();
        if tables.contains_key(name) {
            return Err(DdlError::AlreadyExists(name.to_string()));
        }
        tables.insert(name.to_string(), columns.to_vec());
        Ok(())
    }

    fn drop_table(&self, name: &str) -> Result<(), DdlError> {
        self.check()?;
        self.tables
            .write()
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| DdlError::NotFound(name.to_string()))
    }
}

/// A declared database table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    artefact: Artefact,
    columns: Vec<Column>,
}

impl Table {
    pub const ARTEFACT_TYPE: &'static str = "table";

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }
}

impl Artefactual for Table {
    fn artefact(&self) -> &Artefact {
        &self.artefact
    }

    fn artefact_mut(&mut self) -> &mut Artefact {
        &mut self.artefact
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TableDeclaration {
    name: String,
    columns: Vec<Column>,
    #[serde(default)]
    dependencies: Vec<String>,
}

/// Creates, rebuilds and drops tables
pub struct TableSynchronizer {
    store: Arc<dyn ArtefactStore<Table>>,
    database: Arc<dyn DdlExecutor>,
}

impl TableSynchronizer {
    #[must_use]
    pub fn new(store: Arc<dyn ArtefactStore<Table>>, database: Arc<dyn DdlExecutor>) -> Self {
        Self { store, database }
    }

    fn drop_if_exists(&self, name: &str) -> Result<(), SynchronizerError> {
        if self.database.table_exists(name)? {
            self.database.drop_table(name)?;
            info!(table = name, "table dropped");
        }
        Ok(())
    }
}

impl PhaseEffects<Table> for TableSynchronizer {
    fn create(&self, table: &Table) -> Result<(), SynchronizerError> {
        let name = table.artefact.name();
        if self.database.table_exists(name)? {
            info!(table = name, "table already present, adopted");
            return Ok(());
        }
        self.database.create_table(name, &table.columns)?;
        info!(table = name, columns = table.columns.len(), "table created");
        Ok(())
    }

    fn update(&self, table: &Table) -> Result<(), SynchronizerError> {
        self.drop_if_exists(table.artefact.name())?;
        self.database.create_table(table.artefact.name(), &table.columns)?;
        info!(table = table.artefact.name(), "table rebuilt");
        Ok(())
    }

    fn delete(&self, table: &Table) -> Result<(), SynchronizerError> {
        self.drop_if_exists(table.artefact.name())
    }
}

impl Synchronizer for TableSynchronizer {
    type Artefact = Table;

    fn artefact_type(&self) -> &'static str {
        Table::ARTEFACT_TYPE
    }

    fn file_extension(&self) -> &'static str {
        ".table"
    }

    fn order(&self) -> i32 {
        10
    }

    fn store(&self) -> &dyn ArtefactStore<Table> {
        self.store.as_ref()
    }

    fn parse_impl(&self, location: &str, content: &[u8]) -> Result<Vec<Table>, ParseError> {
        let declaration: TableDeclaration =
            serde_json::from_slice(content).map_err(|e| ParseError::malformed(location, e))?;
        if declaration.columns.is_empty() {
            return Err(ParseError::invalid(location, "a table needs at least one column"));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = declaration.columns.iter().find(|c| !seen.insert(c.name.clone())) {
            return Err(ParseError::invalid(
                location,
                format!("duplicate column {}", dup.name),
            ));
        }
        let artefact = Artefact::new(Table::ARTEFACT_TYPE, location, declaration.name)
            .map_err(|e| ParseError::invalid(location, e))?
            .with_dependencies(declaration.dependencies);
        Ok(vec![Table {
            artefact,
            columns: declaration.columns,
        }])
    }

    fn complete(
        &self,
        wrapper: &mut TopologyWrapper<Table>,
        phase: ArtefactPhase,
        callback: &dyn SynchronizerCallback,
    ) -> Result<CompletionOutcome, SynchronizerError> {
        drive_phase(self, self, wrapper, phase, callback)
    }

    fn cleanup_impl(&self, table: &Table) -> Result<(), SynchronizerError> {
        self.drop_if_exists(table.artefact.name())
    }
}
