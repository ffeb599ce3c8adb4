//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

/// Prints the configuration as TOML, with literal passwords masked.
pub fn dump(config: &ClientConfig, path: Option<&Path>) -> ClientResult<()> {
    let content = toml::to_string_pretty(&config.redacted())
        .map_err(|e| ClientError::config(format!("failed to serialize config: {e}")))?;
    println!("# {}", display_path(path));
    println!("{content}");
    Ok(())
}

/// Checks the configuration, resolving secret references.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    let provider = config.carddav.to_provider_config()?;
    config.poll.to_scheduler_config()?;
    config.display.validate()?;

    println!(
        "CardDAV account {} at {}",
        provider.username.as_deref().unwrap_or_default(),
        provider.url
    );
    println!("Configuration is valid.");
    Ok(())
}

/// Prints the configuration file path.
pub fn path(path: Option<&Path>) -> ClientResult<()> {
    println!("config: {}", display_path(path));
    Ok(())
}

fn display_path(path: Option<&Path>) -> String {
    path.map(Path::to_path_buf)
        .unwrap_or_else(ClientConfig::default_path)
        .display()
        .to_string()
}
