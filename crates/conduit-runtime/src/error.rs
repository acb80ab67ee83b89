//! Errors surfaced by the application root.

use cd_01_factory_registry::FactoryError;
use cd_02_service_factory::ServiceFactoryError;
use cd_04_lifecycle::{ConfigurationError, LifecycleError};
use cd_05_connections::WorkerError;
use thiserror::Error;

use crate::container::ConfigError;

/// Every failure of building or running the runtime. All of them are fatal
/// for the binary.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Invalid runtime configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Data-type registration failed: {0}")]
    Factory(#[from] FactoryError),

    #[error("Service registration failed: {0}")]
    Service(#[from] ServiceFactoryError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
