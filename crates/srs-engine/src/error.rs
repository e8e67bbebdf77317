//! Engine error types.

use crate::session::SessionState;
use thiserror::Error;

/// Errors that can occur while scheduling or running a review session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Settings failed validation.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A session operation was called in the wrong state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// No item with this front exists in the collection.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// An item with this front already exists.
    #[error("Item already exists: {0}")]
    DuplicateItem(String),

    /// A review record would not be later than the previous one.
    #[error("Review for {0} is not later than its previous review")]
    NonMonotonicReview(String),

    /// The backing collection reported a failure.
    #[error("Collection error: {0}")]
    Collection(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
