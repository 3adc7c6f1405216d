//! Apigate error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or dispatching a signed request.
///
/// No variant ever carries the credential secret.
#[derive(Debug, Error)]
pub enum ApigateError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// API parameters could not be encoded as JSON.
    #[error("Can not encode api parameter as json: {0}")]
    Encoding(String),

    /// Device id file could not be created, written or read.
    #[error("Device id storage error [{}]: {message}", .path.display())]
    Storage {
        /// Path of the device id file.
        path: PathBuf,
        /// What failed and why.
        message: String,
    },

    /// The HTTP request object could not be constructed.
    #[error("Can not create http request object: {0}")]
    TransportConstruction(String),

    /// HTTP transport error talking to the gateway.
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// Gateway response could not be decoded.
    #[error("Protocol error: {0}")]
    ProtocolError(String),
}

impl ApigateError {
    pub(crate) fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            message: message.into(),
        }
    }
}
