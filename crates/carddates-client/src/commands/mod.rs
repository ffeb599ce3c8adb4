//! Command implementations.

pub mod config;
pub mod dates;
pub mod test;
pub mod watch;

use carddates_providers::carddav::CardDavProvider;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Builds the CardDAV provider from the `[carddav]` section.
pub fn build_provider(config: &ClientConfig) -> ClientResult<CardDavProvider> {
    let provider_config = config.carddav.to_provider_config()?;
    Ok(CardDavProvider::new(provider_config)?)
}
