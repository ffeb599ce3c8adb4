//! Tracing setup for carddates.
//!
//! All crates log through `tracing`; binaries call [`init_tracing`] once at
//! startup. `RUST_LOG` overrides the configured level. Log lines go to
//! stderr so command output on stdout stays machine readable.
//!
//! ```ignore
//! use carddates_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli(false))?;
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, fmt::format::FmtSpan, prelude::*};

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// The filter directive could not be parsed.
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line human readable output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Configuration for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: Level,
    /// Output format.
    pub output_format: TracingOutputFormat,
    /// Include file and line.
    pub include_location: bool,
    /// Include the module path.
    pub include_target: bool,
    /// Include timestamps.
    pub include_timestamp: bool,
    /// Emit span open/close events.
    pub include_span_events: bool,
    /// Explicit filter directive; takes precedence over `default_level`.
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Pretty,
            include_location: false,
            include_target: true,
            include_timestamp: true,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Settings for one-shot CLI commands: warnings only unless `debug`.
    #[must_use]
    pub fn cli(debug: bool) -> Self {
        Self {
            default_level: if debug { Level::DEBUG } else { Level::WARN },
            output_format: TracingOutputFormat::Compact,
            include_location: debug,
            include_target: debug,
            include_timestamp: false,
            ..Self::default()
        }
    }

    /// Settings for the long-running poller.
    #[must_use]
    pub fn poller() -> Self {
        Self {
            output_format: TracingOutputFormat::Compact,
            include_span_events: true,
            ..Self::default()
        }
    }

    /// Sets the default level.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Sets an explicit filter directive.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Builds the filter: explicit directive, then `RUST_LOG`, then the
    /// default level for the carddates crates.
    pub fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        if let Some(ref directive) = self.env_filter {
            return Ok(EnvFilter::try_new(directive)?);
        }
        Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let level = self.default_level.to_string().to_lowercase();
            EnvFilter::new(format!(
                "warn,carddates_core={level},carddates_providers={level},\
                 carddates_server={level},carddates_client={level},carddates={level}"
            ))
        }))
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    fn build_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target)
            .with_span_events(self.span_events());

        match (self.output_format, self.include_timestamp) {
            (TracingOutputFormat::Pretty, true) => base.pretty().boxed(),
            (TracingOutputFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
            (TracingOutputFormat::Json, true) => base.json().boxed(),
            (TracingOutputFormat::Json, false) => base.json().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if a subscriber is already installed or the filter is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.build_filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.build_layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.default_level, Level::INFO);
        assert_eq!(config.output_format, TracingOutputFormat::Pretty);
        assert!(config.include_timestamp);
        assert!(config.env_filter.is_none());
    }

    #[test]
    fn cli_config_levels() {
        assert_eq!(TracingConfig::cli(false).default_level, Level::WARN);
        let debug = TracingConfig::cli(true);
        assert_eq!(debug.default_level, Level::DEBUG);
        assert!(debug.include_location);
        assert!(!debug.include_timestamp);
    }

    #[test]
    fn poller_config() {
        let config = TracingConfig::poller();
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert!(config.include_span_events);
    }

    #[test]
    fn explicit_filter_is_used() {
        let config = TracingConfig::default().with_env_filter("carddates_providers=trace");
        assert!(config.build_filter().is_ok());
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let config = TracingConfig::default().with_env_filter("carddates=notalevel");
        assert!(matches!(config.build_filter(), Err(TracingError::EnvFilter(_))));
    }
}
