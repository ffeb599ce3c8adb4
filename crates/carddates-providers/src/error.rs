//! Error types for date provider operations.
//!
//! Every failure that aborts a fetch cycle is a [`ProviderError`]. Its
//! [`ProviderErrorCode`] tells the poller whether the failure is transient.
//! Individual vCard properties that cannot be parsed are not errors; they
//! are dropped by the parser.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// Credentials were rejected (401).
    AuthenticationFailed,
    /// The account may not access the resource (403).
    AuthorizationFailed,
    /// Connection, TLS or timeout failure.
    NetworkError,
    /// Too many requests (429).
    RateLimited,
    /// The server failed (5xx).
    ServerError,
    /// A discovery step could not produce the URL it needs.
    DiscoveryFailed,
    /// An addressbook REPORT returned something other than 207.
    UnexpectedStatus,
    /// The response body could not be interpreted.
    InvalidResponse,
    /// Resource not found (404).
    NotFound,
    /// Missing or invalid configuration.
    ConfigurationError,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if the next poll cycle may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError | Self::RateLimited | Self::ServerError | Self::UnexpectedStatus
        )
    }

    /// Returns a stable machine-readable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::AuthorizationFailed => "authorization_failed",
            Self::NetworkError => "network_error",
            Self::RateLimited => "rate_limited",
            Self::ServerError => "server_error",
            Self::DiscoveryFailed => "discovery_failed",
            Self::UnexpectedStatus => "unexpected_status",
            Self::InvalidResponse => "invalid_response",
            Self::NotFound => "not_found",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The discovery step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiscoveryStage {
    /// The well-known probe.
    WellKnown,
    /// Resolving `current-user-principal`.
    Principal,
    /// Resolving `addressbook-home-set`.
    HomeSet,
    /// Listing the addressbook collections.
    Addressbooks,
}

impl DiscoveryStage {
    /// Returns the stage name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WellKnown => "well-known",
            Self::Principal => "principal",
            Self::HomeSet => "addressbook-home-set",
            Self::Addressbooks => "addressbooks",
        }
    }
}

impl fmt::Display for DiscoveryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error that occurred while fetching contact dates.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    provider: Option<String>,
    stage: Option<DiscoveryStage>,
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a new provider error with the given code and message.
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider: None,
            stage: None,
            status: None,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthorizationFailed, message)
    }

    /// Creates a network (transport) error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates a rate limit error.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::RateLimited, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ServerError, message)
    }

    /// Creates a discovery error for the given stage.
    pub fn discovery(stage: DiscoveryStage, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::DiscoveryFailed, message);
        err.stage = Some(stage);
        err
    }

    /// Creates an unexpected status error.
    pub fn unexpected_status(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::UnexpectedStatus, message);
        err.status = Some(status);
        err
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a not found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NotFound, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the provider name for this error.
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Tags the error with the discovery stage it happened in, unless it
    /// already carries one.
    pub fn at_stage(mut self, stage: DiscoveryStage) -> Self {
        self.stage.get_or_insert(stage);
        self
    }

    /// Records the HTTP status that caused this error.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    /// Returns the error code.
    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the provider name, if set.
    pub fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    /// Returns the discovery stage, if the error happened during discovery.
    pub fn stage(&self) -> Option<DiscoveryStage> {
        self.stage
    }

    /// Returns the HTTP status, if one caused the error.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns true if this error is transient and may be retried.
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Copies code, message and tags without the source.
    pub fn detached(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            provider: self.provider.clone(),
            stage: self.stage,
            status: self.status,
            source: None,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref provider) = self.provider {
            write!(f, "[{}] ", provider)?;
        }
        write!(f, "{}", self.code)?;
        if let Some(stage) = self.stage {
            write!(f, " ({})", stage)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
