/// Errors from encoding or decoding keys and values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The value's variant cannot be represented by this codec.
    #[error("{codec} codec cannot encode {variant} values")]
    UnsupportedValue {
        codec: &'static str,
        variant: &'static str,
    },

    /// Bytes were not valid UTF-8.
    #[error("invalid utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure reported by a custom codec.
    #[error("{codec} codec failed: {reason}")]
    Custom { codec: String, reason: String },
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
