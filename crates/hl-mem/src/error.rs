//! Error types for `hl-mem`.
//!
//! Out-of-memory is the only failure the collector and the arena report
//! during normal operation. The remaining variants cover requests that cannot
//! be represented, rejected configuration and stale arena savepoints.

use std::fmt;

/// Errors returned by the collector and the arena allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The system allocator returned null for an old-generation block.
    OutOfMemory {
        /// Total bytes requested, header included.
        requested: usize,
    },

    /// An arena chunk or the young buffer could not be allocated.
    ChunkAllocationFailed {
        /// The requested chunk size.
        size: usize,
    },

    /// The request does not fit an allocation header or a `Layout`.
    AllocationTooLarge {
        /// The requested payload size.
        requested: usize,
        /// The largest payload this allocator accepts.
        limit: usize,
    },

    /// A configuration value was rejected.
    InvalidConfig {
        /// Human-readable reason.
        reason: String,
    },

    /// The savepoint no longer describes a live position of this arena.
    StaleSavepoint,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OutOfMemory { requested } => {
                write!(f, "Out of memory: failed to allocate {requested} bytes")
            }
            Error::ChunkAllocationFailed { size } => {
                write!(f, "Failed to allocate chunk of size {size} bytes")
            }
            Error::AllocationTooLarge { requested, limit } => {
                write!(
                    f,
                    "Allocation too large: requested {requested} bytes, limit {limit} bytes"
                )
            }
            Error::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {reason}")
            }
            Error::StaleSavepoint => {
                write!(f, "Savepoint is stale or belongs to another arena")
            }
        }
    }
}

impl std::error::Error for Error {}

/// Result type for `hl-mem` operations.
pub type Result<T> = std::result::Result<T, Error>;
