//! Poller: scheduler and date store.
//!
//! This crate keeps a set of contact dates fresh:
//! - [`Scheduler`] decides when a cycle runs (hourly, with backoff)
//! - [`Poller`] runs a cycle against a [`carddates_providers::DatesProvider`]
//! - [`DateStore`] serves the last good snapshot, even while cycles fail
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use carddates_providers::{DatesProvider, ErrorProvider, ProviderError};
//! use carddates_server::{DateStore, Poller, Scheduler};
//!
//! #[tokio::main]
//! async fn main() {
//!     let provider: Arc<dyn DatesProvider> =
//!         Arc::new(ErrorProvider::new("demo", ProviderError::configuration("no account")));
//!     let poller = Poller::new(provider, Arc::new(DateStore::new()));
//!     let scheduler = Scheduler::new(poller.scheduler_config());
//!     let (handle, task) = poller.spawn(scheduler);
//!
//!     handle.stop().await.ok();
//!     task.await.ok();
//! }
//! ```

mod error;
mod poller;
mod scheduler;
mod store;

pub use error::{ServerError, ServerResult};
pub use poller::Poller;
pub use scheduler::{
    DEFAULT_POLL_INTERVAL, MAX_POLL_INTERVAL, Scheduler, SchedulerCommand, SchedulerConfig,
    SchedulerHandle, SchedulerState, SharedSchedulerState,
};
pub use store::{DateSnapshot, DateStore, SyncFailure};
