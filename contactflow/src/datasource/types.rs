//! Run states, results, and events.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::DataSourceError;
use crate::provider::AuthorizationContinuation;
use crate::record::Record;

/// Lifecycle of an aggregation run.
///
/// ```text
/// NotStarted ─► Loading ─► Processing ─► Ready
///                  │            │
///                  └────────────┴──────► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    NotStarted,
    Loading,
    Processing,
    Ready,
    Failed,
}

impl RunState {
    /// Whether a run is in flight.
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Loading | RunState::Processing)
    }

    /// Whether a run has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Ready | RunState::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::NotStarted => "not started",
            RunState::Loading => "loading",
            RunState::Processing => "processing",
            RunState::Ready => "ready",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Identifies a provider within a data source.
///
/// Provider names need not be unique; the registration slot is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderRef {
    /// Registration index.
    pub slot: usize,
    pub name: String,
}

impl ProviderRef {
    pub fn new(slot: usize, name: impl Into<String>) -> Self {
        Self {
            slot,
            name: name.into(),
        }
    }
}

impl fmt::Display for ProviderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' (#{})", self.name, self.slot)
    }
}

/// Counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Providers that contributed.
    pub providers: usize,
    /// Records in the final set.
    pub records: usize,
    /// Records dropped because an earlier provider supplied the same id.
    pub duplicates_dropped: usize,
    /// Authorization challenges forwarded during the run.
    pub authorization_challenges: usize,
    /// Post-processors that ran.
    pub processors_run: usize,
    /// Wall time from `load_contacts` to ready.
    pub elapsed: Duration,
}

/// The merged and processed result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactSet {
    pub records: Vec<Record>,
    pub stats: RunStats,
}

impl ContactSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Notice broadcast to every [`Subscription`](super::Subscription).
#[derive(Debug, Clone)]
pub enum DataSourceEvent {
    /// A provider is waiting on an authorization grant.
    ///
    /// The continuation itself goes to the run handle only.
    AuthorizationRequired { provider: ProviderRef },
    /// The run finished; sent at most once per run.
    Ready(Arc<ContactSet>),
    /// The run failed; sent at most once per run.
    Failed(DataSourceError),
}

/// A forwarded provider challenge with the handle that resumes it.
#[derive(Debug)]
pub struct AuthorizationChallenge {
    pub provider: ProviderRef,
    pub continuation: AuthorizationContinuation,
}

impl AuthorizationChallenge {
    /// Resumes the provider. See [`AuthorizationContinuation::resume`].
    pub fn resume(self) -> bool {
        self.continuation.resume()
    }
}

/// Next thing a run handle has to report.
#[derive(Debug)]
pub enum RunUpdate {
    AuthorizationRequired(AuthorizationChallenge),
    Finished(Result<Arc<ContactSet>, DataSourceError>),
}
