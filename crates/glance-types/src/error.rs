//! Error types for data parsing in glance-types.

use thiserror::Error;

/// Errors that can occur when parsing glucose reading data.
///
/// This error type is transport-agnostic: it covers the share service's
/// record format and the stored representation, but not HTTP or storage
/// failures (those belong in glance-core and glance-store).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The timestamp could not be parsed or is out of range.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// The trend code is not one of the known values (0-7).
    #[error("Unknown trend code: {0}")]
    UnknownTrend(i64),
}

/// Result type alias using glance-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
