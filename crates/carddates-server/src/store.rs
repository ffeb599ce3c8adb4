//! Last known set of contact dates.
//!
//! The store holds one immutable [`DateSnapshot`] at a time. A successful
//! cycle swaps in a whole new snapshot; a failed cycle only records the
//! error, so readers keep getting the previous dates until the account
//! recovers.

use std::sync::Arc;

use carddates_core::{ContactDate, Occurrence, upcoming, window_end};
use carddates_providers::{FetchResult, ProviderError, ProviderErrorCode};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, watch};
use tracing::{debug, warn};

/// An immutable set of dates from one successful cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DateSnapshot {
    /// Every date of the account.
    pub dates: Vec<ContactDate>,
    /// Addressbooks the dates came from.
    pub addressbooks: Vec<String>,
    /// Number of addressbooks left out of the cycle.
    pub skipped_addressbooks: usize,
    /// When the cycle finished; `None` before the first success.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DateSnapshot {
    /// Builds a snapshot from a fetch that finished at `updated_at`.
    pub fn from_fetch(result: FetchResult, updated_at: DateTime<Utc>) -> Self {
        Self {
            dates: result.dates,
            addressbooks: result.addressbooks,
            skipped_addressbooks: result.skipped_addressbooks.len(),
            updated_at: Some(updated_at),
        }
    }

    /// Returns true before the first successful cycle.
    pub fn is_initial(&self) -> bool {
        self.updated_at.is_none()
    }

    /// Returns the occurrences within `days` days from `today`, sorted.
    pub fn upcoming(&self, today: NaiveDate, days: i64) -> Vec<Occurrence<'_>> {
        upcoming(&self.dates, today, window_end(today, days))
    }
}

/// The error of the most recent failed cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncFailure {
    /// Error code.
    #[serde(serialize_with = "serialize_code")]
    pub code: ProviderErrorCode,
    /// Rendered error.
    pub message: String,
    /// When the failure was recorded.
    pub at: DateTime<Utc>,
}

fn serialize_code<S: serde::Serializer>(
    code: &ProviderErrorCode,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(code.as_str())
}

#[derive(Debug, Default)]
struct StoreInner {
    snapshot: Arc<DateSnapshot>,
    last_error: Option<SyncFailure>,
}

/// Shared holder of the current snapshot.
#[derive(Debug)]
pub struct DateStore {
    inner: RwLock<StoreInner>,
    generation: watch::Sender<u64>,
}

impl Default for DateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DateStore {
    /// Creates a store holding an empty initial snapshot.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
            generation: watch::Sender::new(0),
        }
    }

    /// Returns the current snapshot.
    pub async fn snapshot(&self) -> Arc<DateSnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    /// Swaps in a new snapshot and clears the last error.
    pub async fn replace(&self, snapshot: DateSnapshot) {
        let count = snapshot.dates.len();
        {
            let mut inner = self.inner.write().await;
            inner.snapshot = Arc::new(snapshot);
            inner.last_error = None;
        }
        self.generation.send_modify(|g| *g += 1);
        debug!(dates = count, "Snapshot replaced");
    }

    /// Records a failed cycle, keeping the current snapshot.
    pub async fn record_failure(&self, error: &ProviderError) {
        let mut inner = self.inner.write().await;
        inner.last_error = Some(SyncFailure {
            code: error.code(),
            message: error.to_string(),
            at: Utc::now(),
        });
        warn!(
            error = %error,
            kept = inner.snapshot.dates.len(),
            "Cycle failed, serving previous dates"
        );
    }

    /// Returns the error of the last cycle, if it failed.
    pub async fn last_error(&self) -> Option<SyncFailure> {
        self.inner.read().await.last_error.clone()
    }

    /// Returns true if the snapshot predates a failed cycle.
    pub async fn is_stale(&self) -> bool {
        self.inner.read().await.last_error.is_some()
    }

    /// Returns a receiver that changes whenever a snapshot is replaced.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.generation.subscribe()
    }
}
