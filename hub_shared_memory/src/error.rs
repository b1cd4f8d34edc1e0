//! Error types for shared slot operations

use thiserror::Error;

/// Errors that can occur during shared slot operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Invalid slot capacity
    #[error("Invalid slot capacity: {size} bytes (must be 1-{max})")]
    InvalidSize {
        /// Requested capacity in bytes
        size: usize,
        /// Largest supported capacity
        max: usize,
    },

    /// Payload does not fit the slot
    #[error("Payload of {len} bytes exceeds slot capacity {capacity}")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Slot capacity
        capacity: usize,
    },

    /// Header describes a payload longer than the slot
    #[error("Slot {name} is corrupt: length {len} exceeds capacity")]
    Corrupt {
        /// Slot name
        name: String,
        /// Length found in the header
        len: usize,
    },

    /// Reader kept colliding with a writer
    #[error("Slot {name} changed during every read attempt - retry recommended")]
    TornRead {
        /// Slot name
        name: String,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },
}

/// Result type for shared slot operations
pub type ShmResult<T> = Result<T, ShmError>;
