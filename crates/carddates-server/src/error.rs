//! Poller error types.

use carddates_providers::ProviderError;
use thiserror::Error;

/// Result type for poller operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors raised by the poller and its scheduler.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The provider failed a sync cycle.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Invalid scheduler or poller configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The scheduler loop is no longer running.
    #[error("Scheduler is not running")]
    SchedulerStopped,
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns the provider error, if this is one.
    pub fn as_provider(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carddates_providers::ProviderErrorCode;

    #[test]
    fn provider_error_is_transparent() {
        let err: ServerError = ProviderError::authentication("bad password").into();
        assert_eq!(
            err.as_provider().map(ProviderError::code),
            Some(ProviderErrorCode::AuthenticationFailed)
        );
        assert_eq!(
            err.to_string(),
            ProviderError::authentication("bad password").to_string()
        );
    }

    #[test]
    fn config_message() {
        let err = ServerError::config("interval must be positive");
        assert_eq!(err.to_string(), "Configuration error: interval must be positive");
        assert!(err.as_provider().is_none());
    }
}
