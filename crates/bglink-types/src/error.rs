//! Error types for data parsing in bglink-types.

use thiserror::Error;

/// Errors that can occur when parsing glucose data.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Generic invalid data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A trend name that is not part of the canonical set.
    #[error("Unknown trend: {0}")]
    UnknownTrend(String),

    /// A glucose unit other than `mmol` or `mgdl`.
    #[error("Unknown glucose unit: {0}")]
    UnknownUnit(String),
}

/// Result type alias using bglink-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
