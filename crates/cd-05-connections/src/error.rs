//! Error types for the connection engine and workers

use thiserror::Error;

/// Failure of a job posted to a worker.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job panicked; the worker survived.
    #[error("Job panicked: {0}")]
    Panicked(String),

    /// The worker was stopped before the job could run.
    #[error("Worker '{0}' is stopped")]
    WorkerStopped(String),

    /// The producing side was dropped without a result.
    #[error("Completion abandoned before a result was produced")]
    Abandoned,
}

/// Worker creation errors
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The OS refused to spawn the worker thread.
    #[error("Failed to spawn worker '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Connection engine errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// A declared signal does not exist on the bound object or component.
    #[error("Missing signal '{signal}' for key '{key}'")]
    MissingSignal { key: String, signal: String },

    /// A declared slot does not exist on the component.
    #[error("Missing slot '{slot}' for key '{key}'")]
    MissingSlot { key: String, slot: String },

    /// The channel has never been declared.
    #[error("Unknown channel '{0}'")]
    UnknownChannel(String),

    /// The endpoint is already attached to the channel.
    #[error("Endpoint '{endpoint}' already attached to channel '{channel}'")]
    DuplicateEndpoint { channel: String, endpoint: String },
}

/// Result type for connection operations
pub type ConnectionResult<T> = Result<T, ConnectionError>;
