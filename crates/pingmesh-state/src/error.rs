//! Error types for the status store.

use thiserror::Error;

/// Result type alias for status store operations.
pub type StatusResult<T> = Result<T, StatusError>;

/// Errors surfaced to callers of the status store.
///
/// Neither variant leaves the store in a modified state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// A report or one of its observations failed validation.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// History was requested for a node that never reported.
    #[error("not found: {0}")]
    NotFound(String),
}
