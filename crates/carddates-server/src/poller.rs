//! Wiring between a provider, the scheduler and the store.

use std::sync::Arc;

use carddates_providers::DatesProvider;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::ServerResult;
use crate::scheduler::{Scheduler, SchedulerConfig, SchedulerHandle};
use crate::store::{DateSnapshot, DateStore};

/// Runs fetch cycles against one provider and publishes the results.
#[derive(Clone)]
pub struct Poller {
    provider: Arc<dyn DatesProvider>,
    store: Arc<DateStore>,
}

impl Poller {
    /// Creates a poller writing into `store`.
    pub fn new(provider: Arc<dyn DatesProvider>, store: Arc<DateStore>) -> Self {
        Self { provider, store }
    }

    /// Returns the store the poller writes into.
    pub fn store(&self) -> &Arc<DateStore> {
        &self.store
    }

    /// Returns the provider.
    pub fn provider(&self) -> &Arc<dyn DatesProvider> {
        &self.provider
    }

    /// Scheduler config using the provider's suggested interval.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.provider.suggested_poll_interval())
    }

    /// Runs one cycle.
    ///
    /// On success the store gets a new snapshot, which is also returned.
    /// On failure the store keeps its snapshot and records the error.
    pub async fn sync_once(&self) -> ServerResult<Arc<DateSnapshot>> {
        match self.provider.fetch_dates().await {
            Ok(result) => {
                if result.is_partial() {
                    warn!(
                        provider = self.provider.name(),
                        skipped = result.skipped_addressbooks.len(),
                        "Some addressbooks were skipped"
                    );
                }
                let snapshot = DateSnapshot::from_fetch(result, Utc::now());
                info!(
                    provider = self.provider.name(),
                    dates = snapshot.dates.len(),
                    addressbooks = snapshot.addressbooks.len(),
                    "Cycle completed"
                );
                self.store.replace(snapshot).await;
                Ok(self.store.snapshot().await)
            }
            Err(err) => {
                self.store.record_failure(&err).await;
                Err(err.into())
            }
        }
    }

    /// Drives [`Poller::sync_once`] from `scheduler` until it stops.
    pub async fn run(self, scheduler: Scheduler) {
        scheduler
            .run(move || {
                let poller = self.clone();
                async move { poller.sync_once().await.map(|_| ()) }
            })
            .await;
    }

    /// Spawns [`Poller::run`] and returns the scheduler handle with the task.
    pub fn spawn(self, scheduler: Scheduler) -> (SchedulerHandle, JoinHandle<()>) {
        let handle = scheduler.handle();
        let task = tokio::spawn(self.run(scheduler));
        (handle, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use carddates_core::ContactDate;
    use carddates_providers::{
        BoxFuture, FetchResult, ProviderError, ProviderErrorCode, ProviderResult, ProviderStatus,
        SkippedAddressbook,
    };
    use chrono::NaiveDate;

    use crate::error::ServerError;

    struct ScriptedProvider {
        script: Mutex<VecDeque<ProviderResult<FetchResult>>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<ProviderResult<FetchResult>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    impl DatesProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch_dates(&self) -> BoxFuture<'_, ProviderResult<FetchResult>> {
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::internal("script exhausted")));
            Box::pin(async move { next })
        }

        fn test_connection(&self) -> BoxFuture<'_, bool> {
            Box::pin(async { true })
        }

        fn status(&self) -> BoxFuture<'_, ProviderStatus> {
            Box::pin(async { ProviderStatus::new("scripted") })
        }

        fn suggested_poll_interval(&self) -> Duration {
            Duration::from_secs(600)
        }
    }

    fn dates(names: &[&str]) -> FetchResult {
        let date = NaiveDate::from_ymd_opt(1985, 6, 1).unwrap();
        let mut result = FetchResult::with_dates(
            names
                .iter()
                .map(|name| ContactDate::new(*name, date, Some(1985), "bday"))
                .collect(),
        );
        result.addressbooks = vec!["https://example.com/card/".into()];
        result
    }

    #[tokio::test]
    async fn success_replaces_snapshot() {
        let provider = ScriptedProvider::new(vec![Ok(dates(&["Ann", "Bob"]))]);
        let poller = Poller::new(provider, Arc::new(DateStore::new()));

        let snapshot = poller.sync_once().await.unwrap();
        assert_eq!(snapshot.dates.len(), 2);
        assert_eq!(poller.store().snapshot().await.dates.len(), 2);
    }

    #[tokio::test]
    async fn failure_serves_stale_dates() {
        let provider = ScriptedProvider::new(vec![
            Ok(dates(&["Ann"])),
            Err(ProviderError::server("503 Service Unavailable")),
        ]);
        let poller = Poller::new(provider, Arc::new(DateStore::new()));

        poller.sync_once().await.unwrap();
        let err = poller.sync_once().await.unwrap_err();

        assert!(matches!(err, ServerError::Provider(_)));
        let store = poller.store();
        assert!(store.is_stale().await);
        assert_eq!(store.snapshot().await.dates[0].name, "Ann");
        assert_eq!(
            store.last_error().await.map(|f| f.code),
            Some(ProviderErrorCode::ServerError)
        );
    }

    #[tokio::test]
    async fn partial_fetch_is_published() {
        let mut result = dates(&["Ann"]);
        result.skipped_addressbooks.push(SkippedAddressbook {
            url: "https://example.com/shared/".into(),
            reason: "server_error".into(),
        });
        let provider = ScriptedProvider::new(vec![Ok(result)]);
        let poller = Poller::new(provider, Arc::new(DateStore::new()));

        let snapshot = poller.sync_once().await.unwrap();
        assert_eq!(snapshot.skipped_addressbooks, 1);
        assert!(!poller.store().is_stale().await);
    }

    #[test]
    fn interval_comes_from_provider() {
        let poller = Poller::new(ScriptedProvider::new(vec![]), Arc::new(DateStore::new()));
        assert_eq!(poller.scheduler_config().interval, Duration::from_secs(600));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_cycles_recover_after_failure() {
        let provider = ScriptedProvider::new(vec![
            Ok(dates(&["Ann"])),
            Err(ProviderError::network("timed out")),
            Ok(dates(&["Ann", "Bob", "Cy"])),
        ]);
        let store = Arc::new(DateStore::new());
        let poller = Poller::new(provider, store.clone());
        let config = poller.scheduler_config().with_jitter(0.0).with_backoff(
            Duration::from_secs(30),
            Duration::from_secs(300),
            2.0,
        );
        let mut updates = store.subscribe();
        let (handle, task) = poller.spawn(Scheduler::new(config));

        updates.changed().await.unwrap();
        assert_eq!(store.snapshot().await.dates.len(), 1);

        // Second cycle at t=600 fails; the retry at t=630 succeeds.
        tokio::time::sleep(Duration::from_secs(610)).await;
        assert!(store.is_stale().await);
        assert_eq!(store.snapshot().await.dates.len(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!store.is_stale().await);
        assert_eq!(store.snapshot().await.dates.len(), 3);

        handle.stop().await.unwrap();
        task.await.unwrap();
    }
}
