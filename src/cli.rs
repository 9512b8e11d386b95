//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "notrack")]
#[command(author, version, about = "Tracker and malware DNS block list builder for dnsmasq")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Quiet mode (for cron)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download feeds and rebuild the dnsmasq block list
    Update {
        /// Ignore file ages: rebuild now, download every feed, regenerate the TLD list
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration and resolver capabilities
    Test,

    /// Count the sites in the dnsmasq directive files
    Count,

    /// Show the summary of the last run
    Stats,

    /// Show version
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parses_help() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_version_command() {
        let cli = Cli::try_parse_from(["notrack", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_cli_update_command() {
        let cli = Cli::try_parse_from(["notrack", "update"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { force: false }));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }

    #[test]
    fn test_cli_update_force() {
        let cli = Cli::try_parse_from(["notrack", "update", "--force"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { force: true }));
    }

    #[test]
    fn test_cli_global_flags_after_command() {
        let cli = Cli::try_parse_from([
            "notrack",
            "count",
            "--config",
            "/tmp/notrack.yaml",
            "--quiet",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Count));
        assert_eq!(cli.config, PathBuf::from("/tmp/notrack.yaml"));
        assert!(cli.quiet);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_test_and_stats() {
        assert!(matches!(
            Cli::try_parse_from(["notrack", "test"]).unwrap().command,
            Commands::Test
        ));
        assert!(matches!(
            Cli::try_parse_from(["notrack", "stats"]).unwrap().command,
            Commands::Stats
        ));
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["notrack", "install"]).is_err());
    }
}
