//! CardDAV dates provider.

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use carddates_core::parse_vcard_detailed;

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{
    BoxFuture, DatesProvider, FetchResult, ProviderStatus, SkippedAddressbook, SkippedDate,
};

use super::addressbook::fetch_all_vcards;
use super::client::CardDavClient;
use super::config::CardDavConfig;
use super::discovery::DiscoveryResolver;
use super::transport::Transport;

const PROVIDER_NAME: &str = "carddav";

/// CardDAV dates provider.
///
/// Every fetch runs discovery from scratch, REPORTs each addressbook
/// concurrently and parses the vCards locally.
///
/// With a single addressbook, a failed REPORT fails the fetch. With
/// several, failed addressbooks are skipped and listed in
/// [`FetchResult::skipped_addressbooks`]; only if all of them fail does the
/// fetch fail.
pub struct CardDavProvider<T: Transport = CardDavClient> {
    transport: T,
    config: CardDavConfig,
    status: RwLock<ProviderStatus>,
}

impl CardDavProvider<CardDavClient> {
    /// Creates a provider talking HTTP.
    ///
    /// # Errors
    ///
    /// Fails if credentials are missing or the HTTP client cannot be built.
    pub fn new(config: CardDavConfig) -> ProviderResult<Self> {
        if !config.has_credentials() {
            return Err(ProviderError::configuration(
                "CardDAV username and password are required",
            )
            .with_provider(PROVIDER_NAME));
        }
        let client = CardDavClient::new(&config)?;
        Ok(Self::with_transport(config, client))
    }
}

impl<T: Transport> CardDavProvider<T> {
    /// Creates a provider on top of any transport.
    pub fn with_transport(config: CardDavConfig, transport: T) -> Self {
        Self {
            transport,
            config,
            status: RwLock::new(ProviderStatus::new(PROVIDER_NAME)),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CardDavConfig {
        &self.config
    }

    async fn fetch_once(&self) -> ProviderResult<FetchResult> {
        let discovery = DiscoveryResolver::new(&self.transport, &self.config)
            .resolve()
            .await?;

        let report_timeout = self.config.report_timeout;
        let outcomes = join_all(discovery.addressbooks.iter().map(|url| async move {
            (url, fetch_all_vcards(&self.transport, url, report_timeout).await)
        }))
        .await;

        merge(outcomes)
    }

    async fn record(&self, outcome: &ProviderResult<FetchResult>) {
        let mut status = self.status.write().await;
        match outcome {
            Ok(result) => {
                status.last_sync = Some(Utc::now());
                status.error = None;
                status.addressbook_count = result.addressbooks.len();
                status.date_count = result.dates.len();
            }
            Err(err) => status.error = Some(err.to_string()),
        }
    }
}

/// Parses the fetched addressbooks and applies the failure policy.
fn merge(outcomes: Vec<(&Url, ProviderResult<Vec<String>>)>) -> ProviderResult<FetchResult> {
    let single = outcomes.len() == 1;
    let mut result = FetchResult::default();
    let mut first_error: Option<ProviderError> = None;

    for (url, outcome) in outcomes {
        let vcards = match outcome {
            Ok(vcards) => vcards,
            Err(err) if single => return Err(err),
            Err(err) => {
                warn!(url = %url, error = %err, "Skipping addressbook");
                result.skipped_addressbooks.push(SkippedAddressbook {
                    url: url.to_string(),
                    reason: err.to_string(),
                });
                first_error.get_or_insert(err);
                continue;
            }
        };

        result.addressbooks.push(url.to_string());
        result.vcard_count += vcards.len();
        for vcard in &vcards {
            let parsed = parse_vcard_detailed(vcard);
            for skipped in parsed.skipped {
                debug!(
                    contact = %parsed.name,
                    property = %skipped.property,
                    reason = %skipped.reason,
                    "Skipping date property"
                );
                result.skipped_dates.push(SkippedDate {
                    contact: parsed.name.clone(),
                    property: skipped,
                });
            }
            result.dates.extend(parsed.dates);
        }
    }

    if result.addressbooks.is_empty()
        && let Some(err) = first_error
    {
        return Err(err);
    }

    let birthdays = result.dates.iter().filter(|d| d.is_birthday()).count();
    info!(
        birthdays,
        custom = result.dates.len() - birthdays,
        contacts = result.vcard_count,
        addressbooks = result.addressbooks.len(),
        "Fetched contact dates"
    );
    Ok(result)
}

impl<T: Transport> DatesProvider for CardDavProvider<T> {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn fetch_dates(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        Box::pin(async move {
            let outcome = match self.config.fetch_timeout {
                Some(limit) => tokio::time::timeout(limit, self.fetch_once())
                    .await
                    .unwrap_or_else(|_| {
                        Err(ProviderError::network(format!(
                            "Fetch did not finish within {}s",
                            limit.as_secs_f32()
                        )))
                    }),
                None => self.fetch_once().await,
            }
            .map_err(|e| e.with_provider(PROVIDER_NAME));

            self.record(&outcome).await;
            outcome
        })
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            let resolver = DiscoveryResolver::new(&self.transport, &self.config)
                .with_timeout(self.config.probe_timeout);
            match resolver.check_reachable().await {
                Ok(route) => {
                    debug!(route = route.kind(), "Connection test succeeded");
                    true
                }
                Err(err) => {
                    debug!(error = %err, "Connection test failed");
                    false
                }
            }
        })
    }

    fn status(&self) -> BoxFuture<'_, ProviderStatus> {
        Box::pin(async move { self.status.read().await.clone() })
    }
}
