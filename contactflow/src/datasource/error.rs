//! Data source error types.

use std::time::Duration;

use thiserror::Error;

use super::ProviderRef;
use crate::processor::{ChainError, ProcessorError};
use crate::provider::ProviderError;

/// Errors that end (or refuse to start) an aggregation run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataSourceError {
    /// `load_contacts` was called while a run is loading or processing.
    #[error("A run is already in progress")]
    AlreadyRunning,

    /// A provider reported a fatal error.
    #[error("Provider {provider} failed: {source}")]
    ProviderFailed {
        provider: ProviderRef,
        #[source]
        source: ProviderError,
    },

    /// A post-processor failed.
    #[error("Post-processor '{processor}' failed: {source}")]
    Processing {
        processor: String,
        #[source]
        source: ProcessorError,
    },

    /// Providers did not all complete within the configured timeout.
    #[error("Timed out after {}ms waiting for providers: {}", elapsed.as_millis(), join(pending))]
    Timeout {
        elapsed: Duration,
        pending: Vec<ProviderRef>,
    },

    /// A provider's authorization challenge was abandoned after the run
    /// handle went away, so nothing could resume or cancel it.
    #[error("Authorization challenge from provider {provider} was abandoned with no run handle left")]
    AuthorizationAbandoned { provider: ProviderRef },

    /// The run was cancelled by the caller.
    #[error("Run cancelled")]
    Cancelled,

    /// The run ended without producing an outcome.
    #[error("Run aborted: {0}")]
    Aborted(String),
}

impl DataSourceError {
    /// The provider that caused the failure, if any.
    pub fn provider(&self) -> Option<&ProviderRef> {
        match self {
            DataSourceError::ProviderFailed { provider, .. }
            | DataSourceError::AuthorizationAbandoned { provider } => Some(provider),
            _ => None,
        }
    }
}

impl From<ChainError> for DataSourceError {
    fn from(e: ChainError) -> Self {
        DataSourceError::Processing {
            processor: e.processor,
            source: e.source,
        }
    }
}

fn join(providers: &[ProviderRef]) -> String {
    providers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failed_display() {
        let err = DataSourceError::ProviderFailed {
            provider: ProviderRef::new(0, "work"),
            source: ProviderError::Unavailable("work.json".into()),
        };
        assert_eq!(err.provider(), Some(&ProviderRef::new(0, "work")));
        assert!(err.to_string().contains("Provider 'work' (#0) failed"));
        assert!(err.to_string().contains("work.json"));
    }

    #[test]
    fn test_timeout_lists_pending_providers() {
        let err = DataSourceError::Timeout {
            elapsed: Duration::from_millis(1500),
            pending: vec![ProviderRef::new(0, "a"), ProviderRef::new(2, "b")],
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 1500ms waiting for providers: 'a' (#0), 'b' (#2)"
        );
        assert_eq!(err.provider(), None);
    }

    #[test]
    fn test_from_chain_error() {
        let chain_err = ChainError {
            processor: "statistics".into(),
            source: ProcessorError::Other("bad".into()),
        };
        let err: DataSourceError = chain_err.into();
        assert!(matches!(err, DataSourceError::Processing { ref processor, .. } if processor == "statistics"));
    }
}
