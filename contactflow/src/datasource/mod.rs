//! Contact data source: aggregates providers and post-processes the result.
//!
//! A [`DataSource`] holds an ordered set of [`Provider`]s and an ordered
//! chain of [`PostProcessor`]s. Each call to
//! [`load_contacts`](DataSource::load_contacts) starts a run:
//!
//! 1. every provider loads concurrently
//! 2. authorization challenges are forwarded to the [`DataSourceRun`] handle
//! 3. once every provider completed, contributions are merged
//!    ([`MergePolicy`]) and de-duplicated by record id
//! 4. the processor chain runs over the whole set, one processor at a time
//! 5. the run becomes ready exactly once
//!
//! A fatal provider error fails the run immediately; no processor runs.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use contactflow::datasource::{DataSource, DataSourceConfig};
//! use contactflow::ordered::OrderedSet;
//! use contactflow::processor::{PostProcessor, StatisticsPostProcessor, StatisticsSummary};
//! use contactflow::provider::{Provider, StaticProvider};
//! use contactflow::record::Record;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let providers = OrderedSet::<dyn Provider>::new().with(Arc::new(
//!     StaticProvider::new("work", vec![Record::contact("1").phone_number("555-0100").build()]),
//! ));
//! let processors = OrderedSet::<dyn PostProcessor>::new().with(Arc::new(StatisticsPostProcessor));
//!
//! let source = DataSource::new(providers, processors, DataSourceConfig::default());
//! let contacts = source.load_contacts()?.wait().await?;
//!
//! let summary = StatisticsSummary::from_records(&contacts.records)?;
//! assert_eq!(summary.average_phone_numbers(), 1.0);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod merge;
mod run;
mod subscription;
mod types;

pub use config::{DataSourceConfig, MergePolicy, ProcessingMode, DEFAULT_EVENT_CAPACITY};
pub use error::DataSourceError;
pub use run::{DataSourceRun, RunOutcome};
pub use subscription::Subscription;
pub use types::{
    AuthorizationChallenge, ContactSet, DataSourceEvent, ProviderRef, RunState, RunStats,
    RunUpdate,
};

use std::fmt;
use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::ordered::OrderedSet;
use crate::processor::{PostProcessor, ProcessorChain};
use crate::provider::Provider;
use run::RunTask;

/// Aggregates contacts from providers and post-processes them.
pub struct DataSource {
    providers: OrderedSet<dyn Provider>,
    chain: Arc<ProcessorChain>,
    config: DataSourceConfig,
    state: Arc<watch::Sender<RunState>>,
    events: broadcast::Sender<DataSourceEvent>,
}

impl DataSource {
    /// Creates a data source.
    ///
    /// Processors that read a derived key no earlier processor writes are
    /// logged at warn level; the data source is still created.
    pub fn new(
        providers: OrderedSet<dyn Provider>,
        processors: OrderedSet<dyn PostProcessor>,
        config: DataSourceConfig,
    ) -> Self {
        let chain = ProcessorChain::new(processors);
        chain.warn_dependency_issues();

        let (state, _) = watch::channel(RunState::NotStarted);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            providers,
            chain: Arc::new(chain),
            config,
            state: Arc::new(state),
            events,
        }
    }

    /// Starts a run.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`DataSourceError::AlreadyRunning`] if a run is loading or processing.
    pub fn load_contacts(&self) -> Result<DataSourceRun, DataSourceError> {
        let started = self.state.send_if_modified(|state| {
            if state.is_active() {
                return false;
            }
            *state = RunState::Loading;
            true
        });
        if !started {
            return Err(DataSourceError::AlreadyRunning);
        }

        debug!(providers = ?self.provider_names(), "Starting contact run");
        let task = RunTask {
            providers: self.providers.clone(),
            chain: Arc::clone(&self.chain),
            config: self.config.clone(),
            source_state: Arc::clone(&self.state),
            events: self.events.clone(),
        };
        Ok(task.spawn())
    }

    /// Subscribes to run events.
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    /// State of the current (or most recent) run.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    pub fn providers(&self) -> &OrderedSet<dyn Provider> {
        &self.providers
    }

    pub fn processors(&self) -> &ProcessorChain {
        &self.chain
    }

    pub fn config(&self) -> &DataSourceConfig {
        &self.config
    }

    fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl fmt::Debug for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSource")
            .field("providers", &self.provider_names())
            .field("processors", &self.chain)
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::StatisticsPostProcessor;
    use crate::provider::{
        AuthorizationStatus, GatedProvider, ProviderError, SharedAuthorizer, StaticProvider,
    };
    use crate::record::Record;
    use std::time::Duration;

    fn records(ids: &[&str]) -> Vec<Record> {
        ids.iter().map(|id| Record::new(*id)).collect()
    }

    fn source(providers: Vec<Arc<dyn Provider>>) -> DataSource {
        let processors =
            OrderedSet::<dyn PostProcessor>::new().with(Arc::new(StatisticsPostProcessor));
        DataSource::new(
            providers.into_iter().collect(),
            processors,
            DataSourceConfig::default(),
        )
    }

    fn ids(set: &ContactSet) -> Vec<&str> {
        set.records.iter().map(|r| r.id().as_str()).collect()
    }

    #[tokio::test]
    async fn test_ready_with_union_of_providers() {
        let source = source(vec![
            Arc::new(StaticProvider::new("a", records(&["1", "2"]))),
            Arc::new(StaticProvider::new("b", records(&["3"]))),
        ]);
        assert_eq!(source.state(), RunState::NotStarted);

        let set = source.load_contacts().unwrap().wait().await.unwrap();
        assert_eq!(ids(&set), vec!["1", "2", "3"]);
        assert_eq!(set.stats.providers, 2);
        assert_eq!(set.stats.processors_run, 1);
        assert_eq!(source.state(), RunState::Ready);
    }

    #[tokio::test]
    async fn test_no_providers_is_ready_with_empty_set() {
        let source = source(Vec::new());
        let set = source.load_contacts().unwrap().wait().await.unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_second_load_while_running_is_rejected() {
        let source = source(vec![Arc::new(
            StaticProvider::new("slow", records(&["1"])).with_delay(Duration::from_millis(50)),
        )]);

        let run = source.load_contacts().unwrap();
        assert_eq!(
            source.load_contacts().unwrap_err(),
            DataSourceError::AlreadyRunning
        );
        run.wait().await.unwrap();

        // A finished run can be followed by a new one.
        let again = source.load_contacts().unwrap().wait().await.unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn test_challenge_reaches_run_handle() {
        let authorizer = SharedAuthorizer::new(AuthorizationStatus::NotDetermined);
        let source = source(vec![Arc::new(GatedProvider::new(
            StaticProvider::new("contacts", records(&["1"])),
            authorizer.clone(),
        ))]);

        let mut run = source.load_contacts().unwrap();
        let challenge = run.next_challenge().await.unwrap();
        assert_eq!(challenge.provider, ProviderRef::new(0, "contacts"));
        assert_eq!(run.state(), RunState::Loading);

        authorizer.grant();
        assert!(challenge.resume());

        let set = run.wait().await.unwrap();
        assert_eq!(set.stats.authorization_challenges, 1);
    }

    #[tokio::test]
    async fn test_dropped_handle_fails_challenged_run() {
        let source = source(vec![Arc::new(GatedProvider::new(
            StaticProvider::new("contacts", records(&["1"])),
            SharedAuthorizer::new(AuthorizationStatus::NotDetermined),
        ))]);
        let mut subscription = source.subscribe();

        drop(source.load_contacts().unwrap());

        let failure = loop {
            match subscription.recv().await.unwrap() {
                DataSourceEvent::Failed(err) => break err,
                DataSourceEvent::AuthorizationRequired { .. } => continue,
                DataSourceEvent::Ready(_) => panic!("run must not become ready"),
            }
        };
        assert_eq!(
            failure,
            DataSourceError::AuthorizationAbandoned {
                provider: ProviderRef::new(0, "contacts")
            }
        );
        assert_eq!(source.state(), RunState::Failed);
        assert!(source.load_contacts().is_ok());
    }

    #[tokio::test]
    async fn test_wait_fails_run_with_untaken_challenge() {
        let source = source(vec![Arc::new(GatedProvider::new(
            StaticProvider::new("contacts", records(&["1"])),
            SharedAuthorizer::new(AuthorizationStatus::NotDetermined),
        ))]);

        let run = source.load_contacts().unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), run.wait())
            .await
            .expect("wait must not hang")
            .unwrap_err();
        assert!(matches!(err, DataSourceError::AuthorizationAbandoned { .. }));
        assert_eq!(source.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_denied_authorization_fails_run() {
        let source = source(vec![Arc::new(GatedProvider::new(
            StaticProvider::new("contacts", records(&["1"])),
            SharedAuthorizer::new(AuthorizationStatus::Denied),
        ))]);

        let err = source.load_contacts().unwrap().wait().await.unwrap_err();
        assert!(matches!(
            err,
            DataSourceError::ProviderFailed {
                source: ProviderError::AccessDenied(_),
                ..
            }
        ));
        assert_eq!(source.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_subscriber_sees_ready_once() {
        let source = source(vec![Arc::new(StaticProvider::new("a", records(&["1"])))]);
        let mut subscription = source.subscribe();

        source.load_contacts().unwrap().wait().await.unwrap();

        let event = subscription.recv().await.unwrap();
        assert!(matches!(event, DataSourceEvent::Ready(ref set) if set.len() == 1));
        assert!(subscription.try_recv().is_none());
    }
}
