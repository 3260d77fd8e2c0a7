//! contactflow CLI - command-line interface
//!
//! Loads contacts from one or more JSON files through the contactflow
//! pipeline and reports field statistics.
//!
//! # Usage
//!
//! ```bash
//! # Statistics over two address books
//! contactflow stats work.json home.json
//!
//! # Ask before reading each file, give up after 10 seconds
//! contactflow stats --require-authorization --timeout 10 contacts.json
//!
//! # Print the processed records
//! contactflow stats --json contacts.json
//! ```

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use contactflow::config::ConfigFile;
use contactflow::logging::{init_logging, LoggingGuard};

use commands::config::ConfigCommands;
use commands::stats::StatsArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "contactflow")]
#[command(version)]
#[command(about = "Merge contact sources and report contact statistics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: <config dir>/contactflow/config.ini)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load contact files and print field statistics
    Stats(StatsArgs),

    /// Inspect the configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(cli.config.as_ref())?;
    let _logging = start_logging(&config, cli.verbose)?;

    match cli.command {
        Commands::Stats(args) => commands::stats::run(args, &config),
        Commands::Config { action } => commands::config::run(action, cli.config.as_deref(), &config),
    }
}

/// An explicit path must exist; the default path is optional.
fn load_config(path: Option<&PathBuf>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(ConfigFile::load(path)?),
        None => match ConfigFile::default_path() {
            Some(path) => Ok(ConfigFile::load_or_default(&path)?),
            None => Ok(ConfigFile::default()),
        },
    }
}

fn start_logging(config: &ConfigFile, verbose: bool) -> Result<LoggingGuard, CliError> {
    let mut logging = config.to_logging_config();
    if verbose {
        logging = logging.with_level("contactflow=debug,info");
    } else if config.logging.level == contactflow::logging::DEFAULT_LOG_LEVEL {
        // Keep stderr quiet for normal runs unless the config asks for more.
        logging = logging.with_level("warn");
    }
    Ok(init_logging(&logging)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_stats_flags() {
        let cli = Cli::parse_from([
            "contactflow",
            "stats",
            "--timeout",
            "5",
            "--merge",
            "completion",
            "--inline",
            "--yes",
            "a.json",
            "b.json",
        ]);
        let Commands::Stats(args) = cli.command else {
            panic!("expected stats command");
        };
        assert_eq!(args.files.len(), 2);
        assert_eq!(args.timeout, Some(5));
        assert!(args.inline);
        assert!(args.yes);
    }

    #[test]
    fn test_stats_requires_files() {
        assert!(Cli::try_parse_from(["contactflow", "stats"]).is_err());
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.ini");
        assert!(load_config(Some(&path)).is_err());
    }
}
