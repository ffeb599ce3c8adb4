//! `carddates test`.

use carddates_providers::DatesProvider;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Probes the server without fetching contacts.
pub async fn run(config: &ClientConfig) -> ClientResult<()> {
    let provider = super::build_provider(config)?;
    let url = provider.config().url.to_string();

    if provider.test_connection().await {
        println!("Connection OK: {url}");
        Ok(())
    } else {
        Err(ClientError::ConnectionFailed(url))
    }
}
