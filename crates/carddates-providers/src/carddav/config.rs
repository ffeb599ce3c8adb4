//! CardDAV provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// How the addressbook collections under the home URL are found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressbookListing {
    /// `card/` under the home for partition-routed servers, otherwise
    /// enumerate.
    #[default]
    Auto,
    /// Always use `home + "card/"`.
    CardSuffix,
    /// Always PROPFIND the home at Depth 1.
    Enumerate,
}

/// Configuration for the CardDAV provider.
#[derive(Debug, Clone)]
pub struct CardDavConfig {
    /// Server base URL; discovery starts at its `/.well-known/carddav`.
    pub url: Url,

    /// Username for Basic authentication.
    pub username: Option<String>,

    /// Password for Basic authentication.
    pub password: Option<String>,

    /// Timeout for each discovery PROPFIND.
    pub discovery_timeout: Duration,

    /// Timeout for the connection test probe.
    pub probe_timeout: Duration,

    /// Timeout for each addressbook REPORT.
    pub report_timeout: Duration,

    /// Budget for a whole fetch, across all addressbooks.
    pub fetch_timeout: Option<Duration>,

    /// Whether to verify TLS certificates.
    pub verify_tls: bool,

    /// User agent string.
    pub user_agent: String,

    /// Addressbook listing strategy.
    pub addressbook_listing: AddressbookListing,
}

impl CardDavConfig {
    /// iCloud contacts endpoint.
    pub const ICLOUD_URL: &'static str = "https://contacts.icloud.com";

    /// Default discovery timeout in seconds.
    pub const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 15;

    /// Default probe timeout in seconds.
    pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

    /// Default REPORT timeout in seconds. Large addressbooks are slow.
    pub const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 60;

    /// Creates a configuration for the given server base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn new(url: impl AsRef<str>) -> Result<Self, url::ParseError> {
        Ok(Self::from_url(Url::parse(url.as_ref())?))
    }

    /// Creates a configuration for iCloud.
    pub fn icloud() -> Self {
        Self::from_url(Url::parse(Self::ICLOUD_URL).expect("Invalid iCloud URL"))
    }

    /// Creates a configuration from an already parsed URL.
    pub fn from_url(url: Url) -> Self {
        Self {
            url,
            username: None,
            password: None,
            discovery_timeout: Duration::from_secs(Self::DEFAULT_DISCOVERY_TIMEOUT_SECS),
            probe_timeout: Duration::from_secs(Self::DEFAULT_PROBE_TIMEOUT_SECS),
            report_timeout: Duration::from_secs(Self::DEFAULT_REPORT_TIMEOUT_SECS),
            fetch_timeout: None,
            verify_tls: true,
            user_agent: format!("carddates/{}", env!("CARGO_PKG_VERSION")),
            addressbook_listing: AddressbookListing::Auto,
        }
    }

    /// Sets the credentials for authentication.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Sets the discovery timeout.
    pub fn with_discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the REPORT timeout.
    pub fn with_report_timeout(mut self, timeout: Duration) -> Self {
        self.report_timeout = timeout;
        self
    }

    /// Sets the overall fetch budget.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Disables TLS verification (for testing only).
    pub fn with_insecure_tls(mut self) -> Self {
        self.verify_tls = false;
        self
    }

    /// Sets the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the addressbook listing strategy.
    pub fn with_addressbook_listing(mut self, listing: AddressbookListing) -> Self {
        self.addressbook_listing = listing;
        self
    }

    /// Returns true if credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl Default for CardDavConfig {
    fn default() -> Self {
        Self::icloud()
    }
}
