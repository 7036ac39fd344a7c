use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    /// Transient failure: connection refused, timeout, 5xx.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A concurrent writer won, or a unique key was already taken.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Slot capacity of {capacity} already reached")]
    CapacityExceeded { capacity: u32 },

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Storage rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed storage payload: {0}")]
    Malformed(String),
}

impl StorageError {
    /// Whether retrying the same idempotent read could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Malformed(e.to_string())
    }
}
