//! Error types for the factory registry

use thiserror::Error;

/// Factory registry errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// An identical (base, concrete, key type, key value) entry already exists.
    #[error("Duplicate factory: base '{base}', concrete '{concrete}', key {key_type}={key}")]
    Duplicate {
        base: String,
        concrete: String,
        key_type: String,
        key: String,
    },
}

/// Result type for factory operations
pub type FactoryResult<T> = Result<T, FactoryError>;
