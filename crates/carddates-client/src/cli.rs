//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// carddates - birthdays and anniversaries from your CardDAV contacts
#[derive(Debug, Parser)]
#[command(name = "carddates")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CARDDATES_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch once and print upcoming dates (the default)
    Dates(DatesArgs),

    /// Check that the account is reachable and the credentials work
    Test,

    /// Poll until interrupted, printing dates after each refresh
    Watch(WatchArgs),

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of `carddates dates`.
#[derive(Debug, Default, clap::Args)]
pub struct DatesArgs {
    /// Days to look ahead (default from config)
    #[arg(long, short)]
    pub days: Option<i64>,

    /// Print every date once, ignoring the window
    #[arg(long, conflicts_with = "days")]
    pub all: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Maximum number of dates to print
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

/// Options of `carddates watch`.
#[derive(Debug, Default, clap::Args)]
pub struct WatchArgs {
    /// Seconds between fetches (default from config)
    #[arg(long)]
    pub interval: Option<u64>,

    /// Days to look ahead (default from config)
    #[arg(long, short)]
    pub days: Option<i64>,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_has_no_command() {
        let cli = Cli::try_parse_from(["carddates"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn dates_flags() {
        let cli =
            Cli::try_parse_from(["carddates", "dates", "--days", "14", "--json", "-n", "3"]).unwrap();
        let Some(Command::Dates(args)) = cli.command else {
            panic!("expected dates");
        };
        assert_eq!(args.days, Some(14));
        assert!(args.json);
        assert_eq!(args.limit, Some(3));
        assert!(!args.all);
    }

    #[test]
    fn all_conflicts_with_days() {
        assert!(Cli::try_parse_from(["carddates", "dates", "--all", "--days", "3"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["carddates", "test", "--debug", "--config", "/tmp/c.toml"])
            .unwrap();
        assert!(matches!(cli.command, Some(Command::Test)));
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
