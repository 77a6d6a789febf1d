use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("change record has neither a before nor an after entry")]
    EmptyChange,

    #[error("change record keys disagree: before {before}, after {after}")]
    KeyMismatch { before: String, after: String },
}
