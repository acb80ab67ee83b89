//! Error types for component transitions, the lifecycle manager and
//! configuration replay

use cd_02_service_factory::ServiceFactoryError;
use cd_03_object_registry::RegistryError;
use cd_05_connections::{ConnectionError, JobError, WorkerError};
use cd_06_data_lock::LockError;
use shared_types::{ComponentId, EndpointParseError, GlobalStatus, Key, TypeTag};
use thiserror::Error;

/// Error returned by component code from its extension points.
#[derive(Debug, Error)]
pub enum ComponentError {
    #[error("{0}")]
    Failed(String),

    /// A key the component needs right now is not bound.
    #[error("Missing input '{0}'")]
    MissingInput(Key),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ComponentError {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// Result type of component extension points
pub type ComponentResult<T = ()> = Result<T, ComponentError>;

/// Failure of one component transition.
///
/// Local to the component: the manager and sibling components keep running
/// and the transition can be retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The transition is not allowed from the current status.
    #[error("Component '{component}' cannot {transition} while {status:?}")]
    InvalidState {
        component: ComponentId,
        transition: &'static str,
        status: GlobalStatus,
    },

    /// `configure` already ran, or has not run yet.
    #[error("Component '{component}' cannot {transition}: configuration is {detail}")]
    Configuration {
        component: ComponentId,
        transition: &'static str,
        detail: &'static str,
    },

    /// The component's extension point returned an error or panicked.
    #[error("Component '{component}' failed to {transition}: {reason}")]
    Failed {
        component: ComponentId,
        transition: &'static str,
        reason: String,
    },

    /// A mandatory auto-connection could not be established.
    #[error("Component '{component}' connection error: {source}")]
    Connection {
        component: ComponentId,
        #[source]
        source: ConnectionError,
    },

    #[error("Transition job failed: {0}")]
    Job(#[from] JobError),

    #[error("Component '{component}' did not finish {transition} within {timeout_ms} ms")]
    Timeout {
        component: ComponentId,
        transition: &'static str,
        timeout_ms: u64,
    },
}

/// Result of one component transition
pub type TransitionResult = Result<(), TransitionError>;

/// Lifecycle manager errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Unknown component '{0}'")]
    UnknownComponent(ComponentId),

    #[error("Component '{0}' is already managed")]
    DuplicateComponent(ComponentId),

    #[error("No implementation '{0}' can be instantiated")]
    UnknownImplementation(String),

    /// Explicit start of a component whose mandatory keys are not all bound.
    #[error("Component '{0}' is missing required objects")]
    MissingRequirements(ComponentId),

    #[error("Unknown application input '{0}'")]
    UnknownInput(String),

    #[error("Missing application inputs: {}", .0.join(", "))]
    MissingInputs(Vec<String>),

    /// Output propagation did not settle within the round bound.
    #[error("Cascade did not settle within {rounds} rounds")]
    CascadeLimit { rounds: usize },

    /// `destroy` found components still referenced outside the manager.
    #[error("Components still referenced after destroy: {}", join_ids(.0))]
    StillReferenced(Vec<ComponentId>),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Factory(#[from] ServiceFactoryError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Worker(#[from] WorkerError),
}

/// Result type for lifecycle manager operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Application configuration errors. Every one of them aborts the launch.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration document '{source_name}': {reason}")]
    Parse { source_name: String, reason: String },

    #[error("Failed to read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing parameter '{0}'")]
    MissingParameter(String),

    #[error("Uid '{0}' is declared more than once")]
    DuplicateUid(String),

    #[error("Component '{component}': unknown implementation '{impl_id}'")]
    UnknownImplementation { component: String, impl_id: String },

    #[error("Object '{object}': unknown data type '{type_tag}'")]
    UnknownDataType { object: String, type_tag: TypeTag },

    #[error("Object '{object}': initial value rejected: {reason}")]
    InitialValue { object: String, reason: String },

    #[error("'{directive}' names undeclared component '{uid}'")]
    UndeclaredComponent { directive: &'static str, uid: String },

    #[error("Component '{component}': group slot '{key}#{index}' exceeds {max}")]
    GroupIndexOutOfRange {
        component: String,
        key: String,
        index: usize,
        max: usize,
    },

    #[error("Component '{component}' references undeclared object '{uid}'")]
    UndeclaredObject { component: String, uid: String },

    #[error(transparent)]
    MalformedEndpoint(#[from] EndpointParseError),

    #[error("Endpoint '{0}' does not name a declared component")]
    UnknownEndpoint(String),

    #[error("Component '{component}' ({impl_id}) does not accept '{object}' of type '{type_tag}'")]
    TypeMismatch {
        component: String,
        impl_id: String,
        object: String,
        type_tag: TypeTag,
    },

    #[error("Configuration already launched")]
    AlreadyLaunched,

    /// The build phase failed; everything created so far was rolled back.
    #[error("Launch failed and was rolled back: {0}")]
    Build(#[from] LifecycleError),
}

/// Result type for configuration replay
pub type ConfigurationResult<T> = Result<T, ConfigurationError>;

fn join_ids(ids: &[ComponentId]) -> String {
    ids.iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
