//! Module loader backed by registration functions linked into the binary.

use std::collections::BTreeMap;

use cd_02_service_factory::{ModuleLoader, ServiceFactory, ServiceFactoryError, ServiceFactoryResult};
use cd_04_lifecycle::Component;
use parking_lot::RwLock;
use shared_types::ModuleId;
use tracing::info;

/// Registers a module's constructors into the factory.
pub type ModuleRegistration = fn(&ServiceFactory<dyn Component>) -> ServiceFactoryResult<()>;

/// Maps module ids to registration functions.
#[derive(Default)]
pub struct StaticModuleLoader {
    modules: RwLock<BTreeMap<ModuleId, ModuleRegistration>>,
}

impl StaticModuleLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_module(self, id: impl Into<ModuleId>, register: ModuleRegistration) -> Self {
        self.add_module(id, register);
        self
    }

    /// Make `id` loadable. A later registration for the same id replaces it.
    pub fn add_module(&self, id: impl Into<ModuleId>, register: ModuleRegistration) {
        self.modules.write().insert(id.into(), register);
    }

    #[must_use]
    pub fn modules(&self) -> Vec<ModuleId> {
        self.modules.read().keys().cloned().collect()
    }
}

impl ModuleLoader<dyn Component> for StaticModuleLoader {
    fn load(&self, module: &ModuleId, factory: &ServiceFactory<dyn Component>) -> ServiceFactoryResult<()> {
        let register = self
            .modules
            .read()
            .get(module)
            .copied()
            .ok_or_else(|| ServiceFactoryError::ModuleLoad {
                module: module.clone(),
                reason: "no such module is linked into this binary".to_string(),
            })?;
        register(factory)?;
        info!(module = %module, "Module loaded");
        Ok(())
    }
}
