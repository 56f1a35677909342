//! Error types for derivex
//!
//! Pipeline-stage failures (spill, sort, reduce, publish) are [`Error`] values
//! and surface to the rebuild caller. A single unreadable document is a
//! [`DocumentError`]: it is logged and skipped, and never aborts a rebuild.
//!
//! A lookup miss is not an error at all; readers return `Ok(None)`.

use std::io;
use thiserror::Error;

/// Result type alias for derivex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the index build pipeline and its readers
#[derive(Debug, Error)]
pub enum Error {
    /// Disk read/write failure during spill, sort, reduce, publish or lookup
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A spill or sorted record that cannot be decoded
    ///
    /// Covers records truncated after at least one byte was read, checksum
    /// mismatches and payloads that do not match the builder's schema.
    /// A clean end-of-file is never reported this way.
    #[error("Malformed record at offset {offset}: {detail}")]
    MalformedRecord {
        /// Byte offset of the start of the record
        offset: u64,
        /// What was wrong with it
        detail: String,
    },

    /// A line of a published index file that cannot be parsed
    #[error("Corrupt index line at offset {offset}: {detail}")]
    CorruptIndex {
        /// Byte offset of the start of the line
        offset: u64,
        /// What was wrong with it
        detail: String,
    },

    /// Configuration failed validation or could not be parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Operation called in a state that does not allow it
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Another process is rebuilding the same index
    #[error("Index is locked: {0}")]
    Locked(String),
}

impl Error {
    /// Create a malformed-record error.
    pub fn malformed(offset: u64, detail: impl Into<String>) -> Self {
        Error::MalformedRecord {
            offset,
            detail: detail.into(),
        }
    }

    /// Create a corrupt-index error.
    pub fn corrupt(offset: u64, detail: impl Into<String>) -> Self {
        Error::CorruptIndex {
            offset,
            detail: detail.into(),
        }
    }

    /// True for the I/O failure class.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

/// A single document could not be read or tokenized.
///
/// Rebuilds log these at `warn` and move on to the next document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Document '{id}' skipped: {reason}")]
pub struct DocumentError {
    /// Identifier (URL) of the failing document
    pub id: String,
    /// Human-readable cause
    pub reason: String,
}

impl DocumentError {
    /// Create a document error.
    pub fn new(id: impl Into<String>, reason: impl Into<String>) -> Self {
        DocumentError {
            id: id.into(),
            reason: reason.into(),
        }
    }
}
