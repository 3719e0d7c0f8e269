//! Error types for duel-sync wire handling.

use thiserror::Error;

/// Errors that can occur while encoding or decoding wire data.
#[derive(Debug, Error)]
pub enum WireError {
    /// JSON serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// JSON deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// Square coordinates are not in `a1`..`h8`
    #[error("invalid square: {0:?}")]
    InvalidSquare(String),

    /// Unknown promotion piece name
    #[error("invalid piece: {0:?}")]
    InvalidPiece(String),

    /// Engine state blob is not valid base64
    #[error("invalid state blob: {0}")]
    InvalidBlob(String),
}
