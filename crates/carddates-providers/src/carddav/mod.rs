//! CardDAV dates provider.
//!
//! Fetches contact dates from a CardDAV server, with iCloud's partitioned
//! deployment as the primary target.
//!
//! # Features
//!
//! - Basic authentication on every request
//! - Discovery via the well-known URL, partition header, redirect or a
//!   plain PROPFIND chain, selected by probing
//! - Unfiltered addressbook REPORT, since iCloud rejects filtered queries
//! - Concurrent fetch of several addressbooks
//!
//! # Example
//!
//! ```ignore
//! use carddates_providers::carddav::{CardDavConfig, CardDavProvider};
//!
//! let config = CardDavConfig::icloud().with_credentials("me@icloud.com", "app-password");
//! let provider = CardDavProvider::new(config)?;
//! let result = provider.fetch_dates().await?;
//! ```

mod addressbook;
mod auth;
mod client;
mod config;
pub mod discovery;
mod provider;
pub mod transport;
mod xml;

pub use addressbook::{extract_vcards, fetch_all_vcards};
pub use auth::Credentials;
pub use client::CardDavClient;
pub use config::{AddressbookListing, CardDavConfig};
pub use discovery::{Discovery, DiscoveryResolver, DiscoveryRoute, DiscoveryState};
pub use provider::CardDavProvider;
pub use transport::{DavMethod, DavRequest, DavResponse, Depth, Transport};
