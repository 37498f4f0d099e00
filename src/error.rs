//! Error types for genotrack

use thiserror::Error;

/// Result type alias for genotrack operations
pub type Result<T> = std::result::Result<T, GenotrackError>;

/// Error types that can occur in genotrack
#[derive(Debug, Error)]
pub enum GenotrackError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed compressed block (fatal for the file)
    #[error("Corrupt BGZF block at offset {offset}: {reason}")]
    CorruptBlock {
        /// Compressed file offset of the block
        offset: u64,
        /// What was wrong with it
        reason: String,
    },

    /// Seek target is not a valid block boundary
    #[error("Invalid virtual offset {offset:#x}: {reason}")]
    InvalidOffset {
        /// Raw virtual offset requested
        offset: u64,
        /// Why it was rejected
        reason: String,
    },

    /// Position has no counterpart in the target coordinate space
    #[error("Ambiguous position {position}: no corresponding base (left {left}, right {right})")]
    AmbiguousPosition {
        /// Position that could not be mapped
        position: u64,
        /// Left-anchored candidate in the target space
        left: u64,
        /// Right-anchored candidate in the target space
        right: u64,
    },

    /// Upstream variant stream is not sorted by meta-genome position
    #[error("Variant stream for genome {genome} out of order: {found} after {previous}")]
    StreamOrderViolation {
        /// Genome whose stream misbehaved
        genome: u32,
        /// Last position seen (or emitted)
        previous: u64,
        /// Offending position
        found: u64,
    },

    /// Invalid input data
    #[error("Invalid input: {msg}")]
    InvalidInput {
        /// Error message
        msg: String,
    },

    /// Malformed record line in a tabular file
    #[error("Parse error at line {line}: {msg}")]
    Parse {
        /// 1-based line number
        line: u64,
        /// Error message
        msg: String,
    },

    /// Invalid range or region
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// Operation stopped by the caller's continue check
    #[error("Operation cancelled")]
    Cancelled,
}

impl GenotrackError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput { msg: msg.into() }
    }

    /// Create a parse error for a 1-based line number
    pub fn parse(line: u64, msg: impl Into<String>) -> Self {
        Self::Parse {
            line,
            msg: msg.into(),
        }
    }

    /// Create a corrupt block error
    pub fn corrupt_block(offset: u64, reason: impl Into<String>) -> Self {
        Self::CorruptBlock {
            offset,
            reason: reason.into(),
        }
    }
}
