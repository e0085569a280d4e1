//! crates/resource_board_core/src/error.rs
//!
//! Errors surfaced by board operations. Every variant is terminal for the
//! triggering action and guarantees that nothing was mutated.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// A required field is missing or the input conflicts with existing state.
    #[error("{0}")]
    Validation(String),

    /// The session's role or identity does not allow the action.
    #[error("{0}")]
    NotAuthorized(String),

    /// A stale reference: the listing, request or history entry no longer exists.
    #[error("{0}")]
    NotFound(String),

    /// The storage medium failed; the in-memory state was left untouched.
    #[error("Storage error: {0}")]
    Storage(#[from] PortError),

    /// A collaborator other than storage (e.g. the receipt renderer) failed.
    #[error("Collaborator error: {0}")]
    Collaborator(PortError),
}

pub type BoardResult<T> = Result<T, BoardError>;

impl BoardError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        BoardError::Validation(message.into())
    }

    pub(crate) fn not_authorized(message: impl Into<String>) -> Self {
        BoardError::NotAuthorized(message.into())
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        BoardError::NotFound(message.into())
    }
}
