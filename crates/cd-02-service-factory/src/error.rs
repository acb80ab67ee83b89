//! Error types for the service factory

use shared_types::{ModuleId, TypeTag};
use thiserror::Error;

/// Service factory errors.
///
/// Everything except [`ServiceFactoryError::ModuleLoad`] is a configuration
/// error: the application root treats it as fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceFactoryError {
    /// The implementation is already declared with another interface.
    #[error("Implementation '{impl_id}' declared as '{existing}', redeclared as '{requested}'")]
    InterfaceConflict {
        impl_id: String,
        existing: TypeTag,
        requested: TypeTag,
    },

    /// The implementation already has an in-memory constructor.
    #[error("Implementation '{0}' already has a constructor")]
    DuplicateConstructor(String),

    /// A second module claims an implementation.
    #[error("Implementation '{impl_id}' already belongs to module '{existing}', claimed by '{requested}'")]
    ModuleConflict {
        impl_id: String,
        existing: ModuleId,
        requested: ModuleId,
    },

    /// A manifest lists different consumed data types than the registration.
    #[error("Implementation '{impl_id}': module '{module}' declares different data types")]
    ObjectsMismatch { impl_id: String, module: ModuleId },

    /// No descriptor exists for the implementation.
    #[error("Unknown implementation '{0}'")]
    UnknownImplementation(String),

    /// Module-declared data types are authoritative and do not list this one.
    #[error("Implementation '{impl_id}' does not declare data type '{data_type}'")]
    ObjectNotDeclared { impl_id: String, data_type: TypeTag },

    /// `create` was asked for an implementation under the wrong interface.
    #[error("Implementation '{impl_id}' implements '{actual}', not '{expected}'")]
    InterfaceMismatch {
        impl_id: String,
        expected: TypeTag,
        actual: TypeTag,
    },

    /// No constructor and no owning module.
    #[error("Implementation '{0}' has no constructor and no module declares it")]
    ModuleMissing(String),

    /// The owning module is loaded yet never registered the constructor.
    #[error("Module '{module}' is already loaded and '{impl_id}' is still missing")]
    ModuleAlreadyLoaded { impl_id: String, module: ModuleId },

    /// Loading the module did not register the constructor.
    #[error("After loading module '{module}', '{impl_id}' is still missing")]
    StillMissingAfterLoad { impl_id: String, module: ModuleId },

    /// No loader is installed to bring in the owning module.
    #[error("No module loader installed to load '{module}' for '{impl_id}'")]
    NoModuleLoader { impl_id: String, module: ModuleId },

    /// The module loader failed.
    #[error("Failed to load module '{module}': {reason}")]
    ModuleLoad { module: ModuleId, reason: String },

    /// A module manifest could not be read or parsed.
    #[error("Invalid module manifest '{source_name}': {reason}")]
    Manifest { source_name: String, reason: String },
}

/// Result type for service factory operations
pub type ServiceFactoryResult<T> = Result<T, ServiceFactoryError>;
