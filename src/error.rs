//! Error taxonomy for zvdb.
//!
//! Every fallible library operation returns [`Result`]. Persistence failures
//! distinguish between structural problems (`InvalidFormat`, `Corrupted`) and
//! unusable files (`EmptyFile`, `Truncated`) so callers can decide whether a
//! file is worth retrying.

use thiserror::Error;

/// All errors surfaced by the zvdb public API.
#[derive(Error, Debug)]
pub enum Error {
    /// A vector's length disagrees with the configured dimension, or two
    /// distance operands have different lengths.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Lookup against an id not present in the index graph.
    #[error("node {0} not found in index")]
    NodeNotFound(u64),

    /// Lookup against an id not present in the vector store.
    #[error("id {0} not found in store")]
    IdNotFound(u64),

    /// The same id appeared twice. Only possible when deserializing a
    /// corrupted blob; live inserts assign fresh ids.
    #[error("duplicate id {0}")]
    DuplicateId(u64),

    /// The configured distance metric is undefined for the configured scalar
    /// type (cosine over integers).
    #[error("{metric} distance is not defined for scalar type {scalar}")]
    UnsupportedMetricForType { metric: &'static str, scalar: &'static str },

    /// Configuration validation failure.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A persisted section is malformed or exceeds a validation limit.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The file does not start with the `ZVDB` magic bytes.
    #[error("invalid magic number")]
    InvalidMagicNumber,

    /// The file's format version is newer than this library understands.
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),

    /// The file parsed but its contents violate a cross-section invariant.
    #[error("corrupted index file: {0}")]
    Corrupted(String),

    /// Load was attempted on a zero-length file.
    #[error("file is empty")]
    EmptyFile,

    /// The file ended mid-record.
    #[error("file is truncated")]
    Truncated,

    /// An allocation request could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,

    /// Wrapped storage error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Map `read_exact` failures: EOF mid-record means a truncated file,
    /// anything else is a plain I/O error.
    pub(crate) fn from_read(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            Error::Truncated
        } else {
            Error::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let e = Error::DimensionMismatch {
            expected: 128,
            actual: 64,
        };
        assert_eq!(e.to_string(), "dimension mismatch: expected 128, got 64");
        assert_eq!(Error::NodeNotFound(7).to_string(), "node 7 not found in index");
        assert_eq!(Error::EmptyFile.to_string(), "file is empty");
    }

    #[test]
    fn test_from_read_maps_eof_to_truncated() {
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(Error::from_read(eof), Error::Truncated));
        let other = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(matches!(Error::from_read(other), Error::Io(_)));
    }

    #[test]
    fn test_io_conversion() {
        fn touch() -> Result<()> {
            std::fs::metadata("/definitely/not/a/real/path/zvdb")?;
            Ok(())
        }
        assert!(matches!(touch(), Err(Error::Io(_))));
    }
}
