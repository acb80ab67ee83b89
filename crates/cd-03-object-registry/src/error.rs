//! Error types for the object-service registry

use shared_types::{Access, ComponentId, Key};
use thiserror::Error;

/// Object-service registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The key is already bound on the component with another access mode.
    #[error("Key '{key}' of '{component}' is bound as '{existing}', not '{requested}'")]
    AccessConflict {
        component: ComponentId,
        key: Key,
        existing: Access,
        requested: Access,
    },

    #[error("Key '{key}' of '{component}' addresses a group slot beyond {max}")]
    GroupIndexOutOfRange {
        component: ComponentId,
        key: Key,
        max: usize,
    },

    /// Components must have a non-empty identity.
    #[error("Empty component id")]
    EmptyComponentId,
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;
