//! Error types for the blink B-link tree.

use thiserror::Error;

/// Result type alias using BlinkError.
pub type Result<T> = std::result::Result<T, BlinkError>;

/// Errors that can occur in tree, cache and file operations.
#[derive(Debug, Error)]
pub enum BlinkError {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Address {addr} does not fit in {width} bytes")]
    AddressOverflow { addr: u64, width: usize },

    // Cache errors
    #[error("Node cache full, every frame is pinned")]
    CacheFull,

    #[error("Node at {addr} is already protected")]
    NodeProtected { addr: u64 },

    #[error("Node at {addr} is pinned")]
    NodePinned { addr: u64 },

    // Tree errors
    #[error("Key not found")]
    NotFound,

    #[error("Duplicate key")]
    DuplicateKey,

    #[error("Corrupt node at {addr}: {reason}")]
    CorruptNode { addr: u64, reason: String },

    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter { name: String, value: String },
}

impl BlinkError {
    /// Builds an `InvariantViolation`.
    ///
    /// Debug builds abort here; release builds hand the error back to the
    /// caller so it propagates as a fatal result.
    #[track_caller]
    pub fn invariant(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        debug_assert!(false, "internal invariant violated: {reason}");
        BlinkError::InvariantViolation(reason)
    }

    /// Returns true for the recoverable "search key absent" outcome.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlinkError::NotFound)
    }
}
