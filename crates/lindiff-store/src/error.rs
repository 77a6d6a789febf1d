use lindiff_codec::CodecError;
use lindiff_types::{TypeError, Version};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The snapshot has been closed.
    #[error("snapshot at version {0} is closed")]
    SnapshotClosed(Version),

    /// A requested version lies beyond what the snapshot can see.
    #[error("version {requested} is beyond snapshot version {available}")]
    VersionOutOfRange { requested: Version, available: Version },

    /// Attempted to rewrite history inside the confirmed prefix.
    #[error("cannot rewrite confirmed history: length {requested} < confirmed length {confirmed}")]
    RewriteConfirmed { requested: Version, confirmed: Version },

    /// Attempted to confirm more history than exists.
    #[error("confirmed length {requested} exceeds history length {length}")]
    ConfirmBeyondLength { requested: Version, length: Version },

    /// The backend produced a malformed change record.
    #[error("invalid change record: {0}")]
    InvalidRecord(#[from] TypeError),

    /// Key or value encoding failed.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error from the underlying storage or transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
