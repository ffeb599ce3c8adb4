//! DatesProvider trait definition.
//!
//! A [`DatesProvider`] is what the poller talks to: one call that returns
//! every contact date the account holds, and one cheap call that checks
//! whether the account is reachable at all.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use carddates_core::{ContactDate, SkippedProperty};
use chrono::{DateTime, Utc};

use crate::error::{ProviderError, ProviderResult};

/// An addressbook that was left out of a fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAddressbook {
    /// The addressbook URL.
    pub url: String,
    /// Why it was skipped.
    pub reason: String,
}

/// A date property that was dropped while parsing a contact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDate {
    /// Contact name.
    pub contact: String,
    /// The rejected property.
    pub property: SkippedProperty,
}

/// Result of one full fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// Every date found, in no particular order.
    pub dates: Vec<ContactDate>,
    /// Addressbooks that were read successfully.
    pub addressbooks: Vec<String>,
    /// Addressbooks that failed and were skipped.
    pub skipped_addressbooks: Vec<SkippedAddressbook>,
    /// Date properties that produced no entry.
    pub skipped_dates: Vec<SkippedDate>,
    /// Number of vCard records seen.
    pub vcard_count: usize,
}

impl FetchResult {
    /// Creates a result holding only dates.
    pub fn with_dates(dates: Vec<ContactDate>) -> Self {
        Self {
            dates,
            ..Self::default()
        }
    }

    /// Returns true if some addressbooks were skipped.
    pub fn is_partial(&self) -> bool {
        !self.skipped_addressbooks.is_empty()
    }
}

/// Status information about a provider.
#[derive(Debug, Clone)]
pub struct ProviderStatus {
    /// The provider name/type.
    pub provider_type: String,
    /// The last successful fetch, if any.
    pub last_sync: Option<DateTime<Utc>>,
    /// The error from the last failed fetch, cleared on success.
    pub error: Option<String>,
    /// Number of addressbooks read on the last successful fetch.
    pub addressbook_count: usize,
    /// Number of dates returned by the last successful fetch.
    pub date_count: usize,
}

impl ProviderStatus {
    /// Creates an empty status.
    pub fn new(provider_type: impl Into<String>) -> Self {
        Self {
            provider_type: provider_type.into(),
            last_sync: None,
            error: None,
            addressbook_count: 0,
            date_count: 0,
        }
    }
}

/// A boxed future for object-safe async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A source of contact dates.
pub trait DatesProvider: Send + Sync {
    /// Returns the provider name (e.g. "carddav").
    fn name(&self) -> &str;

    /// Runs discovery and returns every date of every addressbook.
    ///
    /// Each call starts from scratch; nothing discovered on a previous
    /// call is reused.
    ///
    /// # Errors
    ///
    /// Fails on discovery, transport or status errors. A failure means no
    /// dates at all; callers keep whatever they had before.
    fn fetch_dates(&self) -> BoxFuture<'_, ProviderResult<FetchResult>>;

    /// Checks reachability and credentials without fetching any vCards.
    fn test_connection(&self) -> BoxFuture<'_, bool>;

    /// Returns the current status of the provider.
    fn status(&self) -> BoxFuture<'_, ProviderStatus>;

    /// Poll interval the provider suggests to the scheduler.
    fn suggested_poll_interval(&self) -> Duration {
        Duration::from_secs(3600)
    }
}

/// A provider that always fails with the same error.
///
/// Stands in for a provider that could not be constructed, so the poller
/// keeps running and reports the problem.
#[derive(Debug)]
pub struct ErrorProvider {
    name: String,
    error: ProviderError,
}

impl ErrorProvider {
    /// Creates a new error provider.
    pub fn new(name: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

impl DatesProvider for ErrorProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn fetch_dates(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
        let error = self.error.detached().with_provider(&self.name);
        Box::pin(async move { Err(error) })
    }

    fn test_connection(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }

    fn status(&self) -> BoxFuture<'_, ProviderStatus> {
        let mut status = ProviderStatus::new(&self.name);
        status.error = Some(self.error.to_string());
        Box::pin(async move { status })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorCode;
    use chrono::NaiveDate;

    #[test]
    fn fetch_result_partial() {
        let date = NaiveDate::from_ymd_opt(1990, 2, 28).unwrap();
        let mut result = FetchResult::with_dates(vec![ContactDate::new(
            "Jane Doe",
            date,
            Some(1990),
            "bday",
        )]);
        assert_eq!(result.dates.len(), 1);
        assert!(!result.is_partial());

        result.skipped_addressbooks.push(SkippedAddressbook {
            url: "https://example.com/ab/".into(),
            reason: "unexpected_status: 500".into(),
        });
        assert!(result.is_partial());
    }

    #[tokio::test]
    async fn error_provider_fails_every_call() {
        let provider = ErrorProvider::new(
            "carddav",
            ProviderError::configuration("missing password"),
        );

        assert_eq!(provider.name(), "carddav");
        let err = provider.fetch_dates().await.unwrap_err();
        assert_eq!(err.code(), ProviderErrorCode::ConfigurationError);
        assert_eq!(err.provider(), Some("carddav"));
        assert!(!provider.test_connection().await);

        let status = provider.status().await;
        assert!(status.error.unwrap().contains("missing password"));
        assert!(status.last_sync.is_none());
    }

    #[test]
    fn default_poll_interval_is_hourly() {
        let provider = ErrorProvider::new("x", ProviderError::internal("x"));
        assert_eq!(provider.suggested_poll_interval(), Duration::from_secs(3600));
    }
}
