//! Provider trait, errors, and per-run provider state.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::record::Record;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors a provider can report from an acquisition attempt.
///
/// `AuthorizationRequired` is the only recoverable variant: the attempt can be
/// repeated once an external authorization flow has run. Every other variant
/// is fatal for the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The backing store needs an authorization grant before it can be read.
    #[error("Authorization required: {0}")]
    AuthorizationRequired(String),

    /// Authorization was denied or is restricted.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// The backing store does not exist or cannot be reached.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// I/O failure while reading the backing store.
    #[error("I/O error: {0}")]
    Io(String),

    /// The backing store returned malformed data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Acquisition was cancelled.
    #[error("Acquisition cancelled")]
    Cancelled,
}

impl ProviderError {
    /// Returns true if the attempt may be repeated after authorization.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProviderError::AuthorizationRequired(_))
    }
}

/// A source of records.
///
/// Implementations perform a single acquisition attempt per call to
/// [`acquire`](Provider::acquire). The data source's driver owns the retry
/// loop: when an attempt returns [`ProviderError::AuthorizationRequired`] it
/// forwards a continuation to the caller and calls `acquire` again once the
/// continuation is resumed.
///
/// Long-running implementations should observe `cancel` and return
/// [`ProviderError::Cancelled`] promptly.
pub trait Provider: Send + Sync {
    /// Returns a human-readable name for logging and error reporting.
    fn name(&self) -> &str;

    /// Performs one acquisition attempt, returning records in emission order.
    fn acquire<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Record>, ProviderError>>;
}

/// Lifecycle of one provider within one run.
///
/// ```text
/// Idle -> Loading -> Completed
///            |  ^
///            v  |
///   AwaitingAuthorization
///
/// Loading | AwaitingAuthorization -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Idle,
    Loading,
    AwaitingAuthorization,
    Completed,
    Failed,
}

impl ProviderState {
    /// Completed and Failed accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProviderState::Completed | ProviderState::Failed)
    }

    /// Returns true if moving to `next` is a legal transition.
    pub fn can_transition_to(&self, next: ProviderState) -> bool {
        use ProviderState::*;
        matches!(
            (self, next),
            (Idle, Loading)
                | (Loading, AwaitingAuthorization)
                | (Loading, Completed)
                | (Loading, Failed)
                | (AwaitingAuthorization, Loading)
                | (AwaitingAuthorization, Completed)
                | (AwaitingAuthorization, Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_authorization_is_recoverable() {
        assert!(ProviderError::AuthorizationRequired("contacts".into()).is_recoverable());
        assert!(!ProviderError::AccessDenied("contacts".into()).is_recoverable());
        assert!(!ProviderError::Unavailable("gone".into()).is_recoverable());
        assert!(!ProviderError::Cancelled.is_recoverable());
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        use ProviderState::*;
        for next in [Idle, Loading, AwaitingAuthorization, Completed, Failed] {
            assert!(!Completed.can_transition_to(next));
            assert!(!Failed.can_transition_to(next));
        }
    }

    #[test]
    fn test_authorization_cycle_is_legal() {
        use ProviderState::*;
        assert!(Idle.can_transition_to(Loading));
        assert!(Loading.can_transition_to(AwaitingAuthorization));
        assert!(AwaitingAuthorization.can_transition_to(Loading));
        assert!(Loading.can_transition_to(Completed));
        assert!(!Idle.can_transition_to(Completed));
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::Unavailable("contacts.json".into());
        assert_eq!(err.to_string(), "Source unavailable: contacts.json");
    }
}
