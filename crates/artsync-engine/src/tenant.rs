//! One driver per tenant

use crate::config::{EngineConfig, TenantConfig};
use crate::driver::ReconciliationDriver;
use crate::error::ReconcileError;
use crate::report::PassReport;
use crate::source::FsDefinitionSource;
use artsync_synchronizer::{InMemoryDatabase, RuntimeRegistry, SynchronizerRegistry};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of a pass per tenant, in tenant order
pub type TenantReports = IndexMap<String, Result<PassReport, ReconcileError>>;

/// Applies the engine once per tenant
///
/// Tenants share nothing: each driver owns its registry, stores, runtime
/// registry, definitions and source.
#[derive(Debug, Default)]
pub struct MultitenantReconciler {
    drivers: IndexMap<String, ReconciliationDriver>,
}

impl MultitenantReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drivers with the built-in kinds over each tenant's registry root
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut reconciler = Self::new();
        for tenant in &config.tenants {
            reconciler.insert(builtin_driver(tenant));
        }
        reconciler
    }

    /// Add a driver, replacing any previous one for the same tenant
    pub fn insert(&mut self, driver: ReconciliationDriver) -> Option<ReconciliationDriver> {
        self.drivers.insert(driver.tenant().to_string(), driver)
    }

    #[must_use]
    pub fn driver(&self, tenant: &str) -> Option<&ReconciliationDriver> {
        self.drivers.get(tenant)
    }

    pub fn tenants(&self) -> impl Iterator<Item = &str> {
        self.drivers.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    /// # Errors
    /// [`ReconcileError::UnknownTenant`], or the pass error of that tenant.
    pub fn reconcile(&self, tenant: &str) -> Result<PassReport, ReconcileError> {
        self.drivers
            .get(tenant)
            .ok_or_else(|| ReconcileError::UnknownTenant(tenant.to_string()))?
            .reconcile()
    }

    /// One pass per tenant, one after another
    ///
    /// A tenant whose pass fails does not stop the others.
    pub fn reconcile_all(&self) -> TenantReports {
        self.each("reconcile", ReconciliationDriver::reconcile)
    }

    /// STOP every artefact of every tenant
    pub fn stop_all(&self) -> TenantReports {
        self.each("stop", ReconciliationDriver::stop_all)
    }

    fn each(
        &self,
        what: &str,
        run: impl Fn(&ReconciliationDriver) -> Result<PassReport, ReconcileError>,
    ) -> TenantReports {
        self.drivers
            .iter()
            .map(|(tenant, driver)| {
                let result = run(driver);
                match &result {
                    Ok(report) => info!(
                        tenant = %tenant,
                        errors = report.errors.len(),
                        "{what} finished"
                    ),
                    Err(err) => error!(tenant = %tenant, error = %err, "{what} failed"),
                }
                (tenant.clone(), result)
            })
            .collect()
    }
}

/// Driver with the built-in kinds and fresh in-memory collaborators
#[must_use]
pub fn builtin_driver(tenant: &TenantConfig) -> ReconciliationDriver {
    let runtime = Arc::new(RuntimeRegistry::new());
    let registry = SynchronizerRegistry::with_builtin(&runtime, Arc::new(InMemoryDatabase::new()));
    ReconciliationDriver::new(
        tenant.id.clone(),
        registry,
        FsDefinitionSource::new(&tenant.registry_root),
    )
}
