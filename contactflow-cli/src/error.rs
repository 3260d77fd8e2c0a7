//! CLI error type.

use std::fmt;

use contactflow::config::ConfigError;
use contactflow::datasource::DataSourceError;
use contactflow::logging::LoggingError;
use contactflow::provider::ProviderError;
use contactflow::record::PropertyTypeError;

/// Exit code for a run interrupted with Ctrl-C.
pub const EXIT_INTERRUPTED: u8 = 130;

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Configuration file could not be loaded.
    Config(ConfigError),

    /// Logging could not be set up.
    Logging(LoggingError),

    /// Failed to create the Tokio runtime.
    Runtime(std::io::Error),

    /// Failed to install the Ctrl-C handler or read a prompt.
    Terminal(String),

    /// Access to a contacts file was refused.
    AccessDenied { provider: String },

    /// The contact run failed.
    Run(DataSourceError),

    /// Statistics could not be computed from the processed records.
    Summary(PropertyTypeError),

    /// Output could not be written.
    Output(String),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Run(DataSourceError::Cancelled) => EXIT_INTERRUPTED,
            CliError::Config(_) => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "{}", e),
            CliError::Runtime(e) => write!(f, "Failed to create Tokio runtime: {}", e),
            CliError::Terminal(msg) => write!(f, "Terminal error: {}", msg),
            CliError::AccessDenied { provider } => write!(
                f,
                "No contacts access: permission to read '{}' was not granted",
                provider
            ),
            CliError::Run(DataSourceError::Cancelled) => write!(f, "Interrupted"),
            CliError::Run(e) => write!(f, "{}", e),
            CliError::Summary(e) => write!(f, "Failed to compute statistics: {}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Logging(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Run(e) => Some(e),
            CliError::Summary(e) => Some(e),
            CliError::Terminal(_) | CliError::AccessDenied { .. } | CliError::Output(_) => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PropertyTypeError> for CliError {
    fn from(e: PropertyTypeError) -> Self {
        CliError::Summary(e)
    }
}

impl From<DataSourceError> for CliError {
    fn from(e: DataSourceError) -> Self {
        match e {
            DataSourceError::ProviderFailed {
                provider,
                source: ProviderError::AccessDenied(_),
            } => CliError::AccessDenied {
                provider: provider.name,
            },
            other => CliError::Run(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contactflow::datasource::ProviderRef;

    #[test]
    fn test_access_denied_maps_to_no_access_message() {
        let err: CliError = DataSourceError::ProviderFailed {
            provider: ProviderRef::new(0, "work"),
            source: ProviderError::AccessDenied("denied".to_string()),
        }
        .into();
        assert!(err.to_string().starts_with("No contacts access"));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_cancelled_exit_code() {
        let err: CliError = DataSourceError::Cancelled.into();
        assert_eq!(err.exit_code(), EXIT_INTERRUPTED);
        assert_eq!(err.to_string(), "Interrupted");
    }

    #[test]
    fn test_other_run_errors_pass_through() {
        let err: CliError = DataSourceError::AlreadyRunning.into();
        assert_eq!(err.to_string(), "A run is already in progress");
    }
}
