//! Error types for the diff crate.

use std::fmt;

use lindiff_codec::CodecError;
use lindiff_store::StoreError;

/// Which input snapshot an error concerns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    /// The old (left) snapshot, source of the undo stream.
    Old,
    /// The new (right) snapshot, source of the apply stream.
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Old => write!(f, "old"),
            Self::New => write!(f, "new"),
        }
    }
}

/// A snapshot that failed to close during teardown.
#[derive(Debug)]
pub struct CloseFailure {
    pub side: Side,
    pub error: StoreError,
}

impl fmt::Display for CloseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} snapshot: {}", self.side, self.error)
    }
}

/// Errors that can occur while building or consuming a diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A snapshot has not finished materializing.
    #[error("{side} snapshot is not ready")]
    SnapshotNotReady { side: Side },

    /// A snapshot's store exposes no confirmed length.
    #[error("{side} snapshot exposes no confirmed length")]
    UnsupportedStore { side: Side },

    /// A directional stream broke its ordering contract.
    #[error("{side} diff stream is not strictly ascending by key")]
    OutOfOrder { side: Side },

    /// Failure from either directional stream, propagated verbatim.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Range encoding or result decoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Opening failed, and releasing the owned snapshots failed as well.
    #[error("{error}; also failed to close {} snapshot(s)", failures.len())]
    Teardown {
        #[source]
        error: Box<DiffError>,
        failures: Vec<CloseFailure>,
    },

    /// One or both owned snapshots failed to close.
    #[error("failed to close {} snapshot(s)", failures.len())]
    Close { failures: Vec<CloseFailure> },
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
