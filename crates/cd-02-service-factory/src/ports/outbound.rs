//! Outbound (Driven) ports for the service factory.

use cd_01_factory_registry::BaseType;
use shared_types::ModuleId;

use crate::domain::ServiceFactory;
use crate::error::ServiceFactoryResult;

/// Brings a module into the process.
///
/// The module must register its constructors into `factory` before `load`
/// returns; anything it has not registered by then is treated as missing.
pub trait ModuleLoader<C: BaseType + ?Sized>: Send + Sync {
    fn load(&self, module: &ModuleId, factory: &ServiceFactory<C>) -> ServiceFactoryResult<()>;
}
