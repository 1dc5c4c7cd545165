//! Crate-wide error type.

use std::io;

/// Errors surfaced by MPHF construction and (de)serialization.
///
/// Lookups never fail; a key absent from the indexed set yields the
/// [`NOT_FOUND`](crate::mphf::NOT_FOUND) sentinel instead of an error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input key sequence contained the same key twice.
    #[error("duplicate key {0:#018x} in input set")]
    DuplicateKey(u64),
    /// Error when the `gamma` parameter is not a finite value of at least 1.0.
    #[error("gamma must be a finite value >= 1.0, got {0}")]
    InvalidGamma(f64),
    /// A serialized field held a value the format does not permit.
    #[error("invalid {what} ({value:#x}) at byte offset {offset}")]
    Format {
        /// Which field was rejected.
        what: &'static str,
        /// The raw value read from the stream.
        value: u64,
        /// Byte offset of the field within the stream.
        offset: u64,
    },
    /// The stream ended before the structure was fully read.
    #[error("truncated stream at byte offset {offset}")]
    Truncated {
        /// Byte offset at which the read came up short.
        offset: u64,
    },
    /// The underlying stream failed.
    #[error("i/o error at byte offset {offset}")]
    Io {
        /// Byte offset of the failed read or write.
        offset: u64,
        #[source]
        source: io::Error,
    },
}
