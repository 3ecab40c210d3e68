/// Error types for the mimedb library
use std::io;
use thiserror::Error;

/// Result type alias for mimedb operations
pub type Result<T> = std::result::Result<T, MimeError>;

/// Main error type for mimedb operations
///
/// None of these abort a whole database: definition errors skip one record,
/// cache errors disable one cache file or end one query.
#[derive(Debug, Error)]
pub enum MimeError {
    /// A definition record is missing a required field or has a bad value
    #[error("Malformed definition: {0}")]
    MalformedDefinition(String),

    /// Unrecognized magic match type token
    #[error("Unsupported magic match type: {0}")]
    UnsupportedMagicKind(String),

    /// Cache header reports a version this reader does not understand
    #[error("Invalid cache version {major}.{minor} (supported: 1.1 - 1.2)")]
    InvalidCacheVersion {
        /// Major version found in the header
        major: u16,
        /// Minor version found in the header
        minor: u16,
    },

    /// A read would go past the end of the mapped cache
    #[error("Offset out of bounds: {width} bytes at {offset} (cache size {size})")]
    OffsetOutOfBounds {
        /// Requested offset
        offset: usize,
        /// Number of bytes requested
        width: usize,
        /// Size of the mapped region
        size: usize,
    },

    /// A cache string is not NUL-terminated UTF-8
    #[error("Invalid string at cache offset {offset}")]
    InvalidString {
        /// Offset of the string
        offset: usize,
    },

    /// Cache structure is inconsistent (e.g. a cyclic or too-deep tree)
    #[error("Corrupt cache: {0}")]
    CorruptCache(String),

    /// Glob pattern syntax error
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// XML package could not be parsed
    #[error("XML error: {0}")]
    Xml(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MimeError {
    /// True for errors that mean the cache bytes themselves are corrupt.
    pub fn is_corrupt_cache(&self) -> bool {
        matches!(
            self,
            MimeError::OffsetOutOfBounds { .. }
                | MimeError::InvalidString { .. }
                | MimeError::CorruptCache(_)
        )
    }
}

impl From<quick_xml::Error> for MimeError {
    fn from(err: quick_xml::Error) -> Self {
        MimeError::Xml(err.to_string())
    }
}

impl From<serde_json::Error> for MimeError {
    fn from(err: serde_json::Error) -> Self {
        MimeError::Config(err.to_string())
    }
}
