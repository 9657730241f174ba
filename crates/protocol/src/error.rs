//! Protocol error types

use thiserror::Error;

/// Errors raised while decoding a single record
///
/// A decode error only ever concerns one record; the scan over the
/// remaining records of the packet continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The ASCII payload did not parse as a decimal number
    #[error("Invalid numeric payload: {text:?}")]
    InvalidNumber { text: String },

    /// The record is too short to carry a subtype byte
    #[error("Record carries no subtype byte")]
    MissingSubtype,
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, DecodeError>;
