//! Client error types.

use carddates_providers::ProviderError;
use carddates_server::ServerError;
use thiserror::Error;

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A secret reference could not be resolved.
    #[error("secret error: {0}")]
    Secret(String),

    /// The provider failed.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// The poller failed.
    #[error("poller error: {0}")]
    Server(#[from] ServerError),

    /// The connection test did not pass.
    #[error("cannot reach {0}")]
    ConnectionFailed(String),

    /// Output could not be serialized.
    #[error("output error: {0}")]
    Output(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
