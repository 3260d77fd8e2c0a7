//! Configuration CLI commands.

use std::path::Path;

use clap::Subcommand;
use contactflow::config::ConfigFile;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(
    command: ConfigCommands,
    explicit_path: Option<&Path>,
    config: &ConfigFile,
) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(config),
        ConfigCommands::Path => run_path(explicit_path),
    }
}

fn run_show(config: &ConfigFile) -> Result<(), CliError> {
    let datasource = &config.datasource;
    println!("[datasource]");
    match datasource.timeout {
        Some(timeout) => println!("  timeout_secs = {}", timeout.as_secs()),
        None => println!("  timeout_secs = (none)"),
    }
    println!("  merge_policy = {}", datasource.merge_policy);
    println!("  processing = {}", datasource.processing);
    println!();
    println!("[logging]");
    println!("  level = {}", config.logging.level);
    match &config.logging.file {
        Some(file) => println!("  file = {}", file.display()),
        None => println!("  file = (not set)"),
    }
    Ok(())
}

fn run_path(explicit_path: Option<&Path>) -> Result<(), CliError> {
    match explicit_path
        .map(Path::to_path_buf)
        .or_else(ConfigFile::default_path)
    {
        Some(path) => println!("{}", path.display()),
        None => println!("(no config directory on this platform)"),
    }
    Ok(())
}
