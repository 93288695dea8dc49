//! Error types for the reconciliation engine.

use thiserror::Error;

/// All possible errors from the reconciliation engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Batch-level errors
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    // Item-level errors
    #[error("incomplete item: {0}")]
    IncompleteItem(String),

    // Bookkeeping errors (internal faults)
    #[error("item index {index} out of range for batch of {len}")]
    UnknownItem { index: usize, len: usize },

    #[error("item {0} already resolved")]
    ItemAlreadyResolved(usize),

    #[error("item {0} cannot be resolved back to pending")]
    InvalidTransition(usize),

    #[error("{pending} of {len} items never resolved")]
    UnresolvedItems { pending: usize, len: usize },
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::InvalidPayload("items must be an array".into());
        assert_eq!(err.to_string(), "invalid payload: items must be an array");

        let err = Error::IncompleteItem("userId is required".into());
        assert_eq!(err.to_string(), "incomplete item: userId is required");

        let err = Error::UnknownItem { index: 4, len: 2 };
        assert_eq!(
            err.to_string(),
            "item index 4 out of range for batch of 2"
        );

        let err = Error::UnresolvedItems { pending: 1, len: 3 };
        assert_eq!(err.to_string(), "1 of 3 items never resolved");

        let err = Error::InvalidTransition(2);
        assert_eq!(err.to_string(), "item 2 cannot be resolved back to pending");
    }
}
