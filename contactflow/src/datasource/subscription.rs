//! Observer subscriptions.

use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::warn;

use super::DataSourceEvent;

/// Receives [`DataSourceEvent`]s for every run started after subscribing.
///
/// Dropping the subscription unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<DataSourceEvent>,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<DataSourceEvent>) -> Self {
        Self { rx }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the data source and all of its runs are gone. A
    /// subscriber that falls behind skips the oldest events.
    pub async fn recv(&mut self) -> Option<DataSourceEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged; events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<DataSourceEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged; events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }
}
