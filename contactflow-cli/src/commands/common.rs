//! Common types and utilities shared across CLI commands.

use std::time::Duration;

use clap::ValueEnum;
use contactflow::config::ConfigFile;
use contactflow::datasource::{DataSourceConfig, MergePolicy, ProcessingMode};

/// Merge order selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum MergeOrder {
    /// Files contribute in the order given on the command line
    Registration,
    /// Files contribute in the order they finished loading
    Completion,
}

impl From<MergeOrder> for MergePolicy {
    fn from(order: MergeOrder) -> Self {
        match order {
            MergeOrder::Registration => MergePolicy::RegistrationOrder,
            MergeOrder::Completion => MergePolicy::CompletionOrder,
        }
    }
}

/// Data source overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct DataSourceOverrides {
    pub timeout_secs: Option<u64>,
    pub merge: Option<MergeOrder>,
    pub inline: bool,
}

/// Resolve data source settings: CLI takes precedence, then config.
pub fn resolve_datasource_config(
    overrides: &DataSourceOverrides,
    config: &ConfigFile,
) -> DataSourceConfig {
    let mut resolved = config.to_datasource_config();

    if let Some(secs) = overrides.timeout_secs {
        resolved = match secs {
            0 => DataSourceConfig {
                load_timeout: None,
                ..resolved
            },
            secs => resolved.with_load_timeout(Duration::from_secs(secs)),
        };
    }
    if let Some(order) = overrides.merge {
        resolved = resolved.with_merge_policy(order.into());
    }
    if overrides.inline {
        resolved = resolved.with_processing(ProcessingMode::Inline);
    }
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_used_without_overrides() {
        let config = ConfigFile::parse("[datasource]\ntimeout_secs = 9\n").unwrap();
        let resolved = resolve_datasource_config(&DataSourceOverrides::default(), &config);
        assert_eq!(resolved.load_timeout, Some(Duration::from_secs(9)));
        assert_eq!(resolved.processing, ProcessingMode::Worker);
    }

    #[test]
    fn test_cli_overrides_config() {
        let config = ConfigFile::parse(
            "[datasource]\ntimeout_secs = 9\nmerge_policy = registration\n",
        )
        .unwrap();
        let overrides = DataSourceOverrides {
            timeout_secs: Some(0),
            merge: Some(MergeOrder::Completion),
            inline: true,
        };

        let resolved = resolve_datasource_config(&overrides, &config);
        assert_eq!(resolved.load_timeout, None);
        assert_eq!(resolved.merge_policy, MergePolicy::CompletionOrder);
        assert_eq!(resolved.processing, ProcessingMode::Inline);
    }
}
