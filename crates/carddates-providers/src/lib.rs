//! DatesProvider trait and the CardDAV implementation.
//!
//! - [`DatesProvider`] - what the poller calls once per cycle
//! - [`ProviderError`] - error taxonomy shared by all providers
//! - [`carddav`] - discovery, REPORT fetch and vCard extraction
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  CardDAV server  │
//! └────────┬─────────┘
//!          │ PROPFIND / REPORT
//!          ▼
//! ┌──────────────────┐   discovery   ┌──────────────────┐
//! │  CardDavClient   │◀──────────────│ DiscoveryResolver│
//! │   (Transport)    │               └──────────────────┘
//! └────────┬─────────┘
//!          │ vCard text
//!          ▼
//! ┌──────────────────┐
//! │ CardDavProvider  │──▶ Vec<ContactDate>
//! └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use carddates_providers::{DatesProvider, carddav::{CardDavConfig, CardDavProvider}};
//!
//! let config = CardDavConfig::icloud().with_credentials("me@icloud.com", "app-password");
//! let provider = CardDavProvider::new(config)?;
//! let result = provider.fetch_dates().await?;
//! ```

#[cfg(feature = "carddav")]
pub mod carddav;
pub mod error;
pub mod provider;

pub use error::{DiscoveryStage, ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{
    BoxFuture, DatesProvider, ErrorProvider, FetchResult, ProviderStatus, SkippedAddressbook,
    SkippedDate,
};
