//! Error types for lantern-client

use std::time::Duration;

use thiserror::Error;

/// Client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport failed while sending or receiving
    #[error("Transport error: {0}")]
    Transport(String),

    /// Opening the duplex channel failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// An envelope could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// No response arrived within the caller's deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The connection left the open state while a request was pending
    #[error("Connection closed")]
    ConnectionClosed,

    /// The credential source could not produce a bearer token
    #[error("Credential error: {0}")]
    Credentials(String),

    /// The client has been disposed
    #[error("Client disposed")]
    Disposed,
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
