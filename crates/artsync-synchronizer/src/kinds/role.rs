//! Security role artefacts (`.roles`, several roles per file)

use crate::callback::SynchronizerCallback;
use crate::error::{ParseError, SynchronizerError};
use crate::runtime::RuntimeRegistry;
use crate::store::ArtefactStore;
use crate::synchronizer::{drive_phase, PhaseEffects, Synchronizer};
use artsync_artefact::{Artefact, ArtefactPhase, Artefactual};
use artsync_topology::{CompletionOutcome, TopologyWrapper};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    artefact: Artefact,
    description: Option<String>,
}

impl Role {
    pub const ARTEFACT_TYPE: &'static str = "role";

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

impl Artefactual for Role {
    fn artefact(&self) -> &Artefact {
        &self.artefact
    }

    fn artefact_mut(&mut self) -> &mut Artefact {
        &mut self.artefact
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RoleDeclaration {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
}

pub struct RoleSynchronizer {
    store: Arc<dyn ArtefactStore<Role>>,
    runtime: Arc<RuntimeRegistry>,
}

impl RoleSynchronizer {
    #[must_use]
    pub fn new(store: Arc<dyn ArtefactStore<Role>>, runtime: Arc<RuntimeRegistry>) -> Self {
        Self { store, runtime }
    }
}

impl PhaseEffects<Role> for RoleSynchronizer {
    fn create(&self, role: &Role) -> Result<(), SynchronizerError> {
        self.runtime
            .register_role(role.artefact.name(), role.description.as_deref());
        info!(role = role.artefact.name(), "role registered");
        Ok(())
    }

    fn update(&self, role: &Role) -> Result<(), SynchronizerError> {
        self.runtime.unregister_role(role.artefact.name());
        self.create(role)
    }

    fn delete(&self, role: &Role) -> Result<(), SynchronizerError> {
        if self.runtime.unregister_role(role.artefact.name()) {
            info!(role = role.artefact.name(), "role unregistered");
        }
        Ok(())
    }

    fn start(&self, role: &Role) -> Result<(), SynchronizerError> {
        if !self.runtime.has_role(role.artefact.name()) {
            self.create(role)?;
        }
        Ok(())
    }
}

impl Synchronizer for RoleSynchronizer {
    type Artefact = Role;

    fn artefact_type(&self) -> &'static str {
        Role::ARTEFACT_TYPE
    }

    fn file_extension(&self) -> &'static str {
        ".roles"
    }

    fn order(&self) -> i32 {
        20
    }

    fn store(&self) -> &dyn ArtefactStore<Role> {
        self.store.as_ref()
    }

    fn parse_impl(&self, location: &str, content: &[u8]) -> Result<Vec<Role>, ParseError> {
        let declarations: Vec<RoleDeclaration> =
            serde_json::from_slice(content).map_err(|e| ParseError::malformed(location, e))?;
        declarations
            .into_iter()
            .map(|declaration| -> Result<Role, ParseError> {
                let artefact = Artefact::new(Role::ARTEFACT_TYPE, location, declaration.name)
                    .map_err(|e| ParseError::invalid(location, e))?
                    .with_dependencies(declaration.dependencies);
                Ok(Role {
                    artefact,
                    description: declaration.description,
                })
            })
            .collect()
    }

    fn complete(
        &self,
        wrapper: &mut TopologyWrapper<Role>,
        phase: ArtefactPhase,
        callback: &dyn SynchronizerCallback,
    ) -> Result<CompletionOutcome, SynchronizerError> {
        drive_phase(self, self, wrapper, phase, callback)
    }

    fn cleanup_impl(&self, role: &Role) -> Result<(), SynchronizerError> {
        PhaseEffects::delete(self, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryArtefactStore;
    use crate::error::StoreError;

    const ROLES: &[u8] = br#"[
        {"name": "Operator", "description": "runs jobs"},
        {"name": "Auditor"}
    ]"#;

    #[test]
    fn one_file_declares_several_roles() {
        let store: Arc<InMemoryArtefactStore<Role>> = Arc::new(InMemoryArtefactStore::new());
        let sync = RoleSynchronizer::new(store.clone(), Arc::new(RuntimeRegistry::new()));
        let roles = Synchronizer::parse(&sync, "/sec/app.roles", ROLES).unwrap();
        assert_eq!(roles.len(), 2);
        assert_eq!(store.find_by_location("/sec/app.roles").unwrap().len(), 2);
        assert_eq!(roles[0].description(), Some("runs jobs"));
    }

    #[test]
    fn duplicate_role_in_file_rejected() {
        let store: Arc<InMemoryArtefactStore<Role>> = Arc::new(InMemoryArtefactStore::new());
        let sync = RoleSynchronizer::new(store.clone(), Arc::new(RuntimeRegistry::new()));
        let content = br#"[{"name": "Operator"}, {"name": "Operator"}]"#;
        let err = Synchronizer::parse(&sync, "/sec/app.roles", content).unwrap_err();
        assert!(matches!(err, ParseError::Invalid { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn store_outage_during_parse_is_structural() {
        let store: Arc<InMemoryArtefactStore<Role>> = Arc::new(InMemoryArtefactStore::new());
        store.set_available(false);
        let sync = RoleSynchronizer::new(store, Arc::new(RuntimeRegistry::new()));
        let err = Synchronizer::parse(&sync, "/sec/app.roles", ROLES).unwrap_err();
        assert!(matches!(err, ParseError::Store(StoreError::Unavailable(_))));
        assert!(err.is_structural());
    }
}
