//! Port implementations supplied by the runtime.

pub mod module_loader;

pub use module_loader::{ModuleRegistration, StaticModuleLoader};
