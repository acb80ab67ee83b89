//! Domain layer for the service factory.

pub mod descriptor;
pub mod factory;
pub mod manifest;

pub use descriptor::ServiceDescriptor;
pub use factory::ServiceFactory;
pub use manifest::{ManifestService, ModuleManifest};
