//! # Error Types
//!
//! Errors shared across subsystems.

use thiserror::Error;

/// Errors from parsing a textual binding key.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyParseError {
    /// Empty key or empty group name.
    #[error("Empty key")]
    Empty,

    /// The part after `#` is not an index.
    #[error("Invalid group index in key '{key}'")]
    InvalidIndex { key: String },

    #[error("Group index in key '{key}' exceeds {max}")]
    IndexOutOfRange { key: String, max: usize },
}

/// Errors from parsing a `component/member` endpoint reference.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EndpointParseError {
    /// The reference has no `/` separator or an empty side.
    #[error("Malformed endpoint '{0}': expected 'uid/name'")]
    Malformed(String),
}
