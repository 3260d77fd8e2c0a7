//! Events emitted by provider drivers and the authorization continuation.

use std::fmt;

use tokio::sync::oneshot;

use super::ProviderError;
use crate::record::Record;

/// One-shot handle that resumes a provider waiting for authorization.
///
/// The external authorization flow receives this with the challenge. Calling
/// [`resume`](Self::resume) makes the provider repeat its acquisition attempt.
/// Dropping it (or calling [`discard`](Self::discard)) leaves the provider
/// pending; the run neither completes nor fails on its account.
pub struct AuthorizationContinuation {
    provider: String,
    resume_tx: oneshot::Sender<()>,
}

impl AuthorizationContinuation {
    pub(crate) fn new(provider: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (resume_tx, resume_rx) = oneshot::channel();
        let continuation = Self {
            provider: provider.into(),
            resume_tx,
        };
        (continuation, resume_rx)
    }

    /// Name of the provider waiting on this continuation.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Resumes the provider.
    ///
    /// Returns `false` if the provider is no longer waiting (its run already
    /// ended), in which case nothing happens.
    pub fn resume(self) -> bool {
        self.resume_tx.send(()).is_ok()
    }

    /// Gives up on this challenge without resuming.
    pub fn discard(self) {}
}

impl fmt::Debug for AuthorizationContinuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationContinuation")
            .field("provider", &self.provider)
            .finish()
    }
}

/// What happened to a provider.
#[derive(Debug)]
pub enum ProviderEventKind {
    /// Acquisition finished with these records, in emission order.
    Completed(Vec<Record>),
    /// Acquisition needs an external grant; resume with the continuation.
    AuthorizationRequired(AuthorizationContinuation),
    /// The continuation was dropped without being resumed. The provider stays
    /// pending until the run is cancelled.
    AuthorizationAbandoned,
    /// Acquisition is impossible.
    Failed(ProviderError),
}

/// An event from the provider registered at `slot`.
#[derive(Debug)]
pub struct ProviderEvent {
    /// Registration index of the provider.
    pub slot: usize,
    /// Provider name.
    pub provider: String,
    pub kind: ProviderEventKind,
}
