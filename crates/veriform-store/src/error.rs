use veriform_types::RecordId;

/// Errors from content-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `save` was called with an absent or empty blob.
    #[error("no blob provided")]
    NoBlobProvided,

    /// Malformed metadata or payload input.
    #[error("validation error: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The backing persistence layer failed a write (including quota
    /// exhaustion).
    #[error("storage write failed: {reason}")]
    Write { reason: String },

    /// The backing persistence layer failed a read.
    #[error("storage read failed: {reason}")]
    Read { reason: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
