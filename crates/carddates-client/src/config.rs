//! Client configuration.
//!
//! All settings live in `~/.config/carddates/config.toml`:
//!
//! ```toml
//! [carddav]
//! url = "https://contacts.icloud.com"
//! username = "me@icloud.com"
//! password = "pass::icloud/carddates"
//!
//! [display]
//! days_ahead = 30
//! language = "nl"
//!
//! [poll]
//! interval_secs = 3600
//! ```
//!
//! `username` and `password` support secret references (`pass::…`,
//! `env::…`), see [`crate::secret`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use carddates_core::MAX_DAYS_AHEAD;
use carddates_providers::carddav::{AddressbookListing, CardDavConfig};
use carddates_server::{DEFAULT_POLL_INTERVAL, SchedulerConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};
use crate::render::Language;
use crate::secret;

/// Configuration for the carddates client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Account settings.
    pub carddav: CardDavSettings,
    /// Output settings.
    pub display: DisplaySettings,
    /// `watch` settings.
    pub poll: PollSettings,
}

/// CardDAV account settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CardDavSettings {
    /// Server base URL.
    pub url: String,
    /// Account name (supports secret references).
    pub username: Option<String>,
    /// App-specific password (supports secret references).
    pub password: Option<String>,
    /// How addressbooks are found under the home collection.
    pub listing: AddressbookListing,
    /// Timeout per discovery request, in seconds.
    pub discovery_timeout_secs: u64,
    /// Timeout of the connection test, in seconds.
    pub probe_timeout_secs: u64,
    /// Timeout per addressbook REPORT, in seconds.
    pub report_timeout_secs: u64,
    /// Budget for a whole fetch, in seconds.
    pub fetch_timeout_secs: Option<u64>,
    /// Verify TLS certificates.
    pub verify_tls: bool,
}

impl Default for CardDavSettings {
    fn default() -> Self {
        Self {
            url: CardDavConfig::ICLOUD_URL.to_string(),
            username: None,
            password: None,
            listing: AddressbookListing::Auto,
            discovery_timeout_secs: CardDavConfig::DEFAULT_DISCOVERY_TIMEOUT_SECS,
            probe_timeout_secs: CardDavConfig::DEFAULT_PROBE_TIMEOUT_SECS,
            report_timeout_secs: CardDavConfig::DEFAULT_REPORT_TIMEOUT_SECS,
            fetch_timeout_secs: None,
            verify_tls: true,
        }
    }
}

impl CardDavSettings {
    /// Builds the provider configuration, resolving secret references.
    pub fn to_provider_config(&self) -> ClientResult<CardDavConfig> {
        let username = self.username.as_deref().ok_or_else(|| {
            ClientError::config(format!(
                "no CardDAV account configured. Add to {}:\n  \
                 [carddav]\n  \
                 username = \"me@icloud.com\"\n  \
                 password = \"pass::icloud/carddates\"",
                ClientConfig::default_path().display()
            ))
        })?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| ClientError::config("password is missing from [carddav]"))?;

        let mut config = CardDavConfig::new(&self.url)
            .map_err(|e| ClientError::config(format!("invalid url `{}`: {e}", self.url)))?
            .with_credentials(secret::resolve(username)?, secret::resolve(password)?)
            .with_addressbook_listing(self.listing)
            .with_discovery_timeout(Duration::from_secs(self.discovery_timeout_secs))
            .with_probe_timeout(Duration::from_secs(self.probe_timeout_secs))
            .with_report_timeout(Duration::from_secs(self.report_timeout_secs));

        if let Some(secs) = self.fetch_timeout_secs {
            config = config.with_fetch_timeout(Duration::from_secs(secs));
        }
        if !self.verify_tls {
            config = config.with_insecure_tls();
        }
        Ok(config)
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// How far ahead `dates` looks.
    pub days_ahead: i64,
    /// Show ages and years together.
    pub show_age: bool,
    /// Language of labels and phrases.
    pub language: Language,
    /// Maximum number of lines.
    pub limit: Option<usize>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            days_ahead: 365,
            show_age: true,
            language: Language::En,
            limit: None,
        }
    }
}

impl DisplaySettings {
    /// Rejects a negative or oversized `days_ahead`.
    pub fn validate(&self) -> ClientResult<()> {
        if !(0..=MAX_DAYS_AHEAD).contains(&self.days_ahead) {
            return Err(ClientError::config(format!(
                "display.days_ahead must be between 0 and {MAX_DAYS_AHEAD}, got {}",
                self.days_ahead
            )));
        }
        Ok(())
    }
}

/// `watch` settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Seconds between two fetches.
    pub interval_secs: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
        }
    }
}

impl PollSettings {
    /// Builds the scheduler configuration.
    pub fn to_scheduler_config(&self) -> ClientResult<SchedulerConfig> {
        let config = SchedulerConfig::new(Duration::from_secs(self.interval_secs));
        config.validate()?;
        Ok(config)
    }
}

impl ClientConfig {
    /// Loads the default file, or defaults when it does not exist.
    pub fn load() -> ClientResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads a specific file.
    pub fn load_from(path: &Path) -> ClientResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ClientError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parses TOML content.
    pub fn parse(content: &str) -> ClientResult<Self> {
        toml::from_str(content).map_err(|e| ClientError::config(format!("failed to parse config: {e}")))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("carddates")
            .join("config.toml")
    }

    /// Returns a copy safe to print: literal passwords are masked.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if let Some(password) = &config.carddav.password
            && !secret::is_reference(password)
        {
            config.carddav.password = Some("********".to_string());
        }
        config
    }
}
