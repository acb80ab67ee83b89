//! Error types for data objects and buffers

use shared_types::ObjectId;
use thiserror::Error;

use crate::domain::token::LockMode;

/// Buffer access errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// The buffer was accessed without a live lock token pinning it.
    #[error("Buffer accessed without a live lock token")]
    NotLocked,

    /// Writing or restoring the dump file failed.
    #[error("Buffer I/O failed: {0}")]
    Io(String),

    /// The restored dump does not have the recorded size.
    #[error("Buffer dump corrupt: expected {expected} bytes, found {actual}")]
    Corrupt { expected: usize, actual: usize },
}

impl From<std::io::Error> for BufferError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// Locking errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// Typed access requested a different type than the object holds.
    #[error("Object '{object}' holds '{actual}', not '{expected}'")]
    TypeMismatch {
        object: ObjectId,
        expected: String,
        actual: String,
    },

    /// A bounded lock attempt gave up.
    #[error("Timed out waiting for {mode} lock on '{object}'")]
    Timeout { object: ObjectId, mode: LockMode },

    /// The value type does not support the requested generic operation.
    #[error("Object '{object}' of type '{type_tag}' does not support {operation}")]
    Unsupported {
        object: ObjectId,
        type_tag: String,
        operation: &'static str,
    },

    /// Pinning the backing buffer failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Result type for lock operations
pub type LockResult<T> = Result<T, LockError>;
