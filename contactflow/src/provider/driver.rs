//! Per-run driver that turns provider attempts into events.
//!
//! A [`ProviderDriver`] is the `load()` of one provider for one run. It calls
//! [`Provider::acquire`] and reports the result to the data source over a
//! channel:
//!
//! ```text
//! acquire() ── Ok(records) ───────────────► Completed(records)
//!     ▲      ── Err(AuthorizationRequired) ─► AuthorizationRequired(continuation)
//!     │                                           │
//!     └──────────── continuation.resume() ◄───────┘
//!            ── Err(fatal) ─────────────────► Failed(error)
//! ```
//!
//! A continuation dropped without being resumed is reported once as
//! `AuthorizationAbandoned`; the driver then waits for the run to cancel it.
//!
//! The driver enforces the provider lifecycle: nothing is emitted after
//! `Completed` or `Failed`.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    AuthorizationContinuation, Provider, ProviderError, ProviderEvent, ProviderEventKind,
    ProviderState,
};

/// Drives one provider through one run.
pub struct ProviderDriver {
    slot: usize,
    name: String,
    provider: Arc<dyn Provider>,
    events: mpsc::UnboundedSender<ProviderEvent>,
    cancel: CancellationToken,
    state: ProviderState,
}

impl ProviderDriver {
    /// Creates a driver for the provider registered at `slot`.
    pub fn new(
        slot: usize,
        provider: Arc<dyn Provider>,
        events: mpsc::UnboundedSender<ProviderEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slot,
            name: provider.name().to_string(),
            provider,
            events,
            cancel,
            state: ProviderState::Idle,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProviderState {
        self.state
    }

    /// Spawns [`run`](Self::run) onto the current Tokio runtime.
    pub fn spawn(self) -> JoinHandle<ProviderState> {
        tokio::spawn(self.run())
    }

    /// Runs acquisition until the provider completes, fails, or is cancelled.
    ///
    /// Returns the final state. A provider left waiting on a discarded
    /// continuation stays `AwaitingAuthorization` until the run is cancelled.
    pub async fn run(mut self) -> ProviderState {
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.transition(ProviderState::Loading);
            debug!(provider = %self.name, attempt, "Provider acquisition started");

            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ProviderError::Cancelled),
                result = self.provider.acquire(&self.cancel) => result,
            };

            match outcome {
                Ok(records) => {
                    info!(
                        provider = %self.name,
                        records = records.len(),
                        attempt,
                        "Provider completed"
                    );
                    self.transition(ProviderState::Completed);
                    self.emit(ProviderEventKind::Completed(records));
                    return self.state;
                }
                Err(ProviderError::Cancelled) if self.cancel.is_cancelled() => {
                    debug!(provider = %self.name, "Provider acquisition cancelled");
                    self.transition(ProviderState::Failed);
                    return self.state;
                }
                Err(error) if error.is_recoverable() => {
                    info!(provider = %self.name, %error, "Provider requires authorization");
                    self.transition(ProviderState::AwaitingAuthorization);

                    let (continuation, resume_rx) = AuthorizationContinuation::new(&self.name);
                    if !self.emit(ProviderEventKind::AuthorizationRequired(continuation)) {
                        return self.state;
                    }

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => {
                            debug!(provider = %self.name, "Cancelled while awaiting authorization");
                            self.transition(ProviderState::Failed);
                            return self.state;
                        }
                        resumed = resume_rx => {
                            if resumed.is_ok() {
                                debug!(provider = %self.name, "Authorization continuation resumed");
                                continue;
                            }
                        }
                    }

                    // Continuation discarded: stay pending until the run ends.
                    debug!(provider = %self.name, "Authorization continuation discarded");
                    self.emit(ProviderEventKind::AuthorizationAbandoned);
                    self.cancel.cancelled().await;
                    self.transition(ProviderState::Failed);
                    return self.state;
                }
                Err(error) => {
                    warn!(provider = %self.name, %error, "Provider failed");
                    self.transition(ProviderState::Failed);
                    self.emit(ProviderEventKind::Failed(error));
                    return self.state;
                }
            }
        }
    }

    fn transition(&mut self, next: ProviderState) {
        assert!(
            self.state.can_transition_to(next),
            "provider '{}' cannot move from {:?} to {:?}",
            self.name,
            self.state,
            next
        );
        self.state = next;
    }

    /// Sends an event; returns false if the run is no longer listening.
    fn emit(&self, kind: ProviderEventKind) -> bool {
        let event = ProviderEvent {
            slot: self.slot,
            provider: self.name.clone(),
            kind,
        };
        if self.events.send(event).is_err() {
            debug!(provider = %self.name, "Run no longer listening; event dropped");
            return false;
        }
        true
    }
}
