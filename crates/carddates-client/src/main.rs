//! carddates CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use carddates_client::cli::{Cli, Command, ConfigAction, DatesArgs};
use carddates_client::commands;
use carddates_client::config::ClientConfig;
use carddates_client::error::ClientResult;
use carddates_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = match cli.command {
        Some(Command::Watch(_)) if cli.debug => TracingConfig::poller().with_level(Level::DEBUG),
        Some(Command::Watch(_)) => TracingConfig::poller(),
        _ => TracingConfig::cli(cli.debug),
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config = match cli.config.as_deref() {
        Some(path) => ClientConfig::load_from(path)?,
        None => ClientConfig::load()?,
    };

    match cli.command {
        Some(Command::Dates(args)) => commands::dates::run(&config, args).await,
        None => commands::dates::run(&config, DatesArgs::default()).await,
        Some(Command::Test) => commands::test::run(&config).await,
        Some(Command::Watch(args)) => commands::watch::run(&config, args).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, cli.config.as_deref()),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(cli.config.as_deref()),
        },
    }
}
