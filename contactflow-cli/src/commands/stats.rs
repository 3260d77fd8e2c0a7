//! Stats command - load contact files and report field statistics.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use console::style;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use contactflow::config::ConfigFile;
use contactflow::datasource::{
    AuthorizationChallenge, ContactSet, DataSource, DataSourceError, DataSourceRun, RunUpdate,
};
use contactflow::ordered::OrderedSet;
use contactflow::processor::{
    DisplayNamePostProcessor, PostProcessor, StatisticsPostProcessor, StatisticsSummary,
};
use contactflow::provider::{
    AuthorizationStatus, GatedProvider, JsonFileProvider, Provider, SharedAuthorizer,
};

use super::common::{resolve_datasource_config, DataSourceOverrides, MergeOrder};
use crate::error::CliError;

/// Arguments for the stats command.
#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Contact files (JSON arrays of records)
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Give up if the files have not loaded after this many seconds (0 = never)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Merge order of the files' contacts
    #[arg(long, value_enum)]
    pub merge: Option<MergeOrder>,

    /// Run post-processors on the event task instead of a worker thread
    #[arg(long)]
    pub inline: bool,

    /// Ask for permission before reading the files
    #[arg(long)]
    pub require_authorization: bool,

    /// Grant permission without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Print the processed records as JSON instead of the summary
    #[arg(long)]
    pub json: bool,
}

/// Run the stats command.
pub fn run(args: StatsArgs, config: &ConfigFile) -> Result<(), CliError> {
    let overrides = DataSourceOverrides {
        timeout_secs: args.timeout,
        merge: args.merge,
        inline: args.inline,
    };
    let datasource_config = resolve_datasource_config(&overrides, config);
    debug!(?datasource_config, files = args.files.len(), "Resolved stats settings");

    let authorizer = SharedAuthorizer::new(if args.require_authorization {
        AuthorizationStatus::NotDetermined
    } else {
        AuthorizationStatus::Authorized
    });
    let source = DataSource::new(
        build_providers(&args.files, args.require_authorization, &authorizer),
        build_processors(),
        datasource_config,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let contacts = runtime.block_on(async {
        let run = source.load_contacts()?;
        install_interrupt_handler(run.cancellation_token())?;
        drive(run, &authorizer, args.yes).await
    })?;

    info!(
        records = contacts.stats.records,
        providers = contacts.stats.providers,
        "Stats run finished"
    );

    if args.json {
        print_json(&contacts)
    } else {
        print_summary(&contacts)
    }
}

/// One provider per file. Files sharing a stem are named by their path.
fn build_providers(
    files: &[PathBuf],
    gated: bool,
    authorizer: &SharedAuthorizer,
) -> OrderedSet<dyn Provider> {
    let mut stems: HashMap<String, usize> = HashMap::new();
    for path in files {
        *stems
            .entry(JsonFileProvider::new(path).name().to_string())
            .or_default() += 1;
    }

    files
        .iter()
        .map(|path| {
            let mut provider = JsonFileProvider::new(path);
            if stems.get(provider.name()).copied().unwrap_or(0) > 1 {
                provider = provider.with_name(path.display().to_string());
            }
            if gated {
                Arc::new(GatedProvider::new(provider, authorizer.clone())) as Arc<dyn Provider>
            } else {
                Arc::new(provider) as Arc<dyn Provider>
            }
        })
        .collect()
}

fn build_processors() -> OrderedSet<dyn PostProcessor> {
    OrderedSet::<dyn PostProcessor>::new()
        .with(Arc::new(StatisticsPostProcessor))
        .with(Arc::new(DisplayNamePostProcessor))
}

fn install_interrupt_handler(cancel: CancellationToken) -> Result<(), CliError> {
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|e| CliError::Terminal(format!("Failed to set signal handler: {}", e)))
}

/// Answers challenges until the run finishes.
async fn drive(
    mut run: DataSourceRun,
    authorizer: &SharedAuthorizer,
    auto_grant: bool,
) -> Result<Arc<ContactSet>, CliError> {
    let spinner = spinner();
    let mut decision: Option<bool> = auto_grant.then_some(true);

    let outcome = loop {
        match run.next_update().await {
            Some(RunUpdate::AuthorizationRequired(challenge)) => {
                let granted = match decision {
                    Some(granted) => granted,
                    None => {
                        let granted = spinner.suspend(|| ask_permission(&challenge))?;
                        decision = Some(granted);
                        granted
                    }
                };
                answer(challenge, authorizer, granted);
            }
            Some(RunUpdate::Finished(result)) => break result,
            None => {
                break Err(DataSourceError::Aborted(
                    "run ended without an outcome".to_string(),
                ))
            }
        }
    };

    spinner.finish_and_clear();
    Ok(outcome?)
}

fn spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Loading contacts...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn ask_permission(challenge: &AuthorizationChallenge) -> Result<bool, CliError> {
    Confirm::new()
        .with_prompt(format!(
            "Allow contactflow to read contacts from '{}'?",
            challenge.provider.name
        ))
        .default(true)
        .interact()
        .map_err(|e| CliError::Terminal(e.to_string()))
}

fn answer(challenge: AuthorizationChallenge, authorizer: &SharedAuthorizer, granted: bool) {
    if granted {
        authorizer.grant();
    } else {
        authorizer.deny();
    }
    debug!(provider = %challenge.provider, granted, "Answered authorization challenge");
    if !challenge.resume() {
        debug!("Provider stopped waiting before the answer arrived");
    }
}

fn print_summary(contacts: &ContactSet) -> Result<(), CliError> {
    let summary = StatisticsSummary::from_records(&contacts.records)?;
    println!("{}", summary);
    println!();
    println!(
        "{}",
        style(format!(
            "{} source(s), {} duplicate(s) dropped, {} ms",
            contacts.stats.providers,
            contacts.stats.duplicates_dropped,
            contacts.stats.elapsed.as_millis()
        ))
        .dim()
    );
    Ok(())
}

fn print_json(contacts: &ContactSet) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(&contacts.records)
        .map_err(|e| CliError::Output(e.to_string()))?;
    println!("{}", json);
    Ok(())
}
