// ABOUTME: Broker client error types for all connection, protocol, and request failures
// ABOUTME: Provides structured error reporting with conversions from underlying I/O and codec errors

use crate::codec::CodecError;
use std::io;
use thiserror::Error;

/// Comprehensive error type for broker client operations.
#[derive(Debug, Error)]
pub enum BosswaveError {
    /// I/O error during network operations (connect, read, write)
    #[error("connection error: {0}")]
    Connection(#[from] io::Error),

    /// Malformed frame on the wire; fatal for the connection
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// The broker's first frame was not a `helo` greeting
    #[error("invalid broker greeting: {0}")]
    Handshake(String),

    /// The broker rejected the request; carries the reason it gave
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The connection closed while the request was outstanding
    #[error("connection closed")]
    ConnectionClosed,

    /// An okay response did not have the shape the operation requires
    #[error("{0}")]
    ResponseShape(String),

    /// Invalid caller-supplied data (empty entity key file, ...)
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Result type alias for broker client operations.
pub type BosswaveResult<T> = Result<T, BosswaveError>;

impl From<crate::Error> for BosswaveError {
    fn from(err: crate::Error) -> Self {
        match err.downcast::<CodecError>() {
            Ok(codec) => BosswaveError::Codec(*codec),
            Err(err) => match err.downcast::<io::Error>() {
                Ok(io_err) => BosswaveError::Connection(*io_err),
                Err(err) => BosswaveError::InvalidData(err.to_string()),
            },
        }
    }
}
