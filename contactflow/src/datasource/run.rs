//! One aggregation run: fan-out, fan-in, processing, and the run handle.
//!
//! ```text
//!                 ┌──────────────┐
//!  provider 0 ──► │              │
//!  provider 1 ──► │  run task    │──► MergeBuffer ──► ProcessorChain ──► Ready
//!  provider N ──► │ (event loop) │
//!                 └──────┬───────┘
//!                        │ challenges            outcome (oneshot)
//!                        ▼                            │
//!                  DataSourceRun ◄────────────────────┘
//! ```
//!
//! Each provider runs in its own [`ProviderDriver`] task and reports over a
//! shared unbounded channel. The run task is the only owner of the merge
//! buffer, so completions are serialised without locks.
//!
//! A challenge whose continuation is dropped unresumed leaves its provider
//! pending while the caller still holds the [`DataSourceRun`] and can cancel.
//! Once the handle is gone, or [`DataSourceRun::wait`] stopped taking
//! challenges, such a run fails with
//! [`DataSourceError::AuthorizationAbandoned`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::merge::MergeBuffer;
use super::{
    AuthorizationChallenge, ContactSet, DataSourceConfig, DataSourceError, DataSourceEvent,
    ProcessingMode, ProviderRef, RunState, RunStats, RunUpdate,
};
use crate::ordered::OrderedSet;
use crate::processor::ProcessorChain;
use crate::provider::{Provider, ProviderDriver, ProviderEvent, ProviderEventKind};
use crate::record::Record;

/// Final result of a run.
pub type RunOutcome = Result<Arc<ContactSet>, DataSourceError>;

// =============================================================================
// State publication
// =============================================================================

/// Publishes run state to the data source and to the run handle.
///
/// Dropping it while the run is still active (the run task panicked) marks
/// the run failed so the data source accepts a new run.
struct StatePublisher {
    source: Arc<watch::Sender<RunState>>,
    run: watch::Sender<RunState>,
}

impl StatePublisher {
    fn set(&self, state: RunState) {
        self.source.send_replace(state);
        self.run.send_replace(state);
    }
}

impl Drop for StatePublisher {
    fn drop(&mut self) {
        if self.run.borrow().is_active() {
            error!("Run task ended while active; marking run failed");
            self.set(RunState::Failed);
        }
    }
}

// =============================================================================
// Run task
// =============================================================================

/// Everything a run task needs, moved into the task.
pub(crate) struct RunTask {
    pub providers: OrderedSet<dyn Provider>,
    pub chain: Arc<ProcessorChain>,
    pub config: DataSourceConfig,
    pub source_state: Arc<watch::Sender<RunState>>,
    pub events: broadcast::Sender<DataSourceEvent>,
}

impl RunTask {
    /// Spawns the run and returns its handle.
    ///
    /// The caller has already moved the data source state to `Loading`.
    pub fn spawn(self) -> DataSourceRun {
        let (run_state_tx, run_state_rx) = watch::channel(RunState::Loading);
        let (challenge_tx, challenge_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let publisher = StatePublisher {
            source: Arc::clone(&self.source_state),
            run: run_state_tx,
        };
        let run_cancel = cancel.clone();
        tokio::spawn(async move {
            let outcome = self.execute(&publisher, challenge_tx, run_cancel).await;
            if outcome_tx.send(outcome).is_err() {
                debug!("Run handle dropped before the outcome was delivered");
            }
        });

        DataSourceRun {
            challenges: challenge_rx,
            outcome: Some(outcome_rx),
            state: run_state_rx,
            cancel,
        }
    }

    async fn execute(
        self,
        publisher: &StatePublisher,
        challenges: mpsc::UnboundedSender<AuthorizationChallenge>,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let started = Instant::now();
        let drivers = cancel.child_token();
        info!(
            providers = self.providers.len(),
            processors = self.chain.len(),
            "Loading contacts"
        );

        let result = self.collect(&challenges, &cancel, &drivers, started).await;
        // Stops providers still loading or waiting on authorization.
        drivers.cancel();
        drop(challenges);

        let result = match result {
            Ok((records, mut stats)) => {
                publisher.set(RunState::Processing);
                self.process(records, &mut stats, publisher).await.map(|records| {
                    stats.records = records.len();
                    stats.elapsed = started.elapsed();
                    Arc::new(ContactSet { records, stats })
                })
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(set) => {
                info!(
                    records = set.stats.records,
                    duplicates_dropped = set.stats.duplicates_dropped,
                    elapsed_ms = set.stats.elapsed.as_millis() as u64,
                    "Contacts ready"
                );
                publisher.set(RunState::Ready);
                let _ = self.events.send(DataSourceEvent::Ready(Arc::clone(set)));
            }
            Err(e) => {
                warn!(error = %e, "Contact run failed");
                publisher.set(RunState::Failed);
                let _ = self.events.send(DataSourceEvent::Failed(e.clone()));
            }
        }
        result
    }

    /// Fan-in loop: waits until every provider completed.
    async fn collect(
        &self,
        challenges: &mpsc::UnboundedSender<AuthorizationChallenge>,
        cancel: &CancellationToken,
        drivers: &CancellationToken,
        started: Instant,
    ) -> Result<(Vec<Record>, RunStats), DataSourceError> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ProviderEvent>();
        for (slot, provider) in self.providers.iter().enumerate() {
            ProviderDriver::new(slot, Arc::clone(provider), event_tx.clone(), drivers.clone())
                .spawn();
        }
        drop(event_tx);

        let mut buffer = MergeBuffer::new(
            self.providers.iter().map(|p| p.name().to_string()),
            self.config.merge_policy,
        );
        let mut stats = RunStats {
            providers: self.providers.len(),
            ..RunStats::default()
        };
        let deadline = self.config.load_timeout.map(|timeout| started + timeout);

        while !buffer.is_complete() {
            let event = tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(pending = ?buffer.pending(), "Run cancelled");
                    return Err(DataSourceError::Cancelled);
                }

                _ = deadline_elapsed(deadline) => {
                    return Err(DataSourceError::Timeout {
                        elapsed: started.elapsed(),
                        pending: buffer.pending(),
                    });
                }

                provider = unreachable_abandoned(challenges, buffer.abandoned().cloned()) => {
                    return Err(DataSourceError::AuthorizationAbandoned { provider });
                }

                event = event_rx.recv() => event,
            };

            let Some(event) = event else {
                return Err(DataSourceError::Aborted(
                    "every provider stopped before completing".to_string(),
                ));
            };

            let provider = ProviderRef::new(event.slot, event.provider);
            match event.kind {
                ProviderEventKind::Completed(records) => {
                    debug!(
                        %provider,
                        records = records.len(),
                        completed = buffer.completed() + 1,
                        total = self.providers.len(),
                        "Provider contribution merged"
                    );
                    buffer.complete(event.slot, records);
                }
                ProviderEventKind::AuthorizationRequired(continuation) => {
                    buffer.awaiting_authorization(event.slot);
                    stats.authorization_challenges += 1;
                    let _ = self.events.send(DataSourceEvent::AuthorizationRequired {
                        provider: provider.clone(),
                    });
                    let challenge = AuthorizationChallenge {
                        provider,
                        continuation,
                    };
                    if let Err(mpsc::error::SendError(challenge)) = challenges.send(challenge) {
                        // Dropping the continuation reports the provider abandoned.
                        warn!(
                            provider = %challenge.provider,
                            "No one is listening for authorization challenges"
                        );
                    }
                }
                ProviderEventKind::AuthorizationAbandoned => {
                    debug!(%provider, "Authorization continuation dropped");
                    buffer.abandon(event.slot);
                }
                ProviderEventKind::Failed(source) => {
                    buffer.fail(event.slot);
                    return Err(DataSourceError::ProviderFailed { provider, source });
                }
            }
        }

        let merged = buffer.freeze();
        stats.duplicates_dropped = merged.duplicates_dropped;
        Ok((merged.records, stats))
    }

    /// Runs the processor chain over the frozen set.
    ///
    /// A panicking processor fails the run for observers before the panic
    /// resumes on the run task.
    async fn process(
        &self,
        mut records: Vec<Record>,
        stats: &mut RunStats,
        publisher: &StatePublisher,
    ) -> Result<Vec<Record>, DataSourceError> {
        debug!(
            records = records.len(),
            mode = %self.config.processing,
            "Post-processing started"
        );

        match self.config.processing {
            ProcessingMode::Inline => {
                let result =
                    std::panic::catch_unwind(AssertUnwindSafe(|| self.chain.run(&mut records)));
                match result {
                    Ok(result) => {
                        stats.processors_run = result?;
                        Ok(records)
                    }
                    Err(panic) => self.abort_on_panic(publisher, panic),
                }
            }
            ProcessingMode::Worker => {
                let chain = Arc::clone(&self.chain);
                let joined = tokio::task::spawn_blocking(move || {
                    let result = chain.run(&mut records);
                    (records, result)
                })
                .await;

                match joined {
                    Ok((records, result)) => {
                        stats.processors_run = result?;
                        Ok(records)
                    }
                    Err(e) if e.is_panic() => self.abort_on_panic(publisher, e.into_panic()),
                    Err(e) => Err(DataSourceError::Aborted(format!(
                        "post-processing worker stopped: {}",
                        e
                    ))),
                }
            }
        }
    }

    fn abort_on_panic(&self, publisher: &StatePublisher, panic: Box<dyn Any + Send>) -> ! {
        let error = DataSourceError::Aborted("a post-processor panicked".to_string());
        error!(%error, "Post-processing panicked");
        publisher.set(RunState::Failed);
        let _ = self.events.send(DataSourceEvent::Failed(error));
        std::panic::resume_unwind(panic)
    }
}

async fn deadline_elapsed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Resolves once an abandoned provider can no longer be resumed or cancelled.
async fn unreachable_abandoned(
    challenges: &mpsc::UnboundedSender<AuthorizationChallenge>,
    abandoned: Option<ProviderRef>,
) -> ProviderRef {
    match abandoned {
        Some(provider) => {
            challenges.closed().await;
            provider
        }
        None => std::future::pending().await,
    }
}

// =============================================================================
// Run handle
// =============================================================================

/// Handle to an in-flight run, returned by
/// [`DataSource::load_contacts`](super::DataSource::load_contacts).
///
/// Authorization challenges are delivered here, in order, to a single
/// consumer. Dropping the handle detaches from the run; it keeps going and
/// observers still receive its events. A challenge that can no longer be
/// delivered, or whose continuation is dropped after the handle is gone,
/// fails the run with [`DataSourceError::AuthorizationAbandoned`].
#[derive(Debug)]
pub struct DataSourceRun {
    challenges: mpsc::UnboundedReceiver<AuthorizationChallenge>,
    outcome: Option<oneshot::Receiver<RunOutcome>>,
    state: watch::Receiver<RunState>,
    cancel: CancellationToken,
}

impl DataSourceRun {
    /// Waits for the next challenge or for the run to finish.
    ///
    /// Challenges queued before the outcome are always returned first.
    /// Returns `None` once `Finished` has been returned.
    pub async fn next_update(&mut self) -> Option<RunUpdate> {
        let outcome = self.outcome.as_mut()?;
        let finished = tokio::select! {
            biased;
            Some(challenge) = self.challenges.recv() => {
                return Some(RunUpdate::AuthorizationRequired(challenge));
            }
            result = outcome => result,
        };
        self.outcome = None;
        Some(RunUpdate::Finished(finished.unwrap_or_else(|_| Err(lost_outcome()))))
    }

    /// Waits for the next authorization challenge.
    ///
    /// Returns `None` once the run has finished and no challenge is queued.
    pub async fn next_challenge(&mut self) -> Option<AuthorizationChallenge> {
        self.challenges.recv().await
    }

    /// Waits for the run to finish.
    ///
    /// Challenges not yet taken, and any raised while waiting, are discarded
    /// and fail the run with [`DataSourceError::AuthorizationAbandoned`];
    /// drive them with [`next_update`](Self::next_update) instead.
    pub async fn wait(mut self) -> RunOutcome {
        self.challenges.close();
        while let Ok(challenge) = self.challenges.try_recv() {
            debug!(provider = %challenge.provider, "Discarding authorization challenge");
        }
        match self.outcome.take() {
            Some(outcome) => outcome.await.unwrap_or_else(|_| Err(lost_outcome())),
            None => Err(DataSourceError::Aborted(
                "outcome was already delivered".to_string(),
            )),
        }
    }

    /// Current state of this run.
    pub fn state(&self) -> RunState {
        *self.state.borrow()
    }

    /// Cancels the run. Has no effect once post-processing has started.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

fn lost_outcome() -> DataSourceError {
    DataSourceError::Aborted("run task ended without an outcome".to_string())
}
