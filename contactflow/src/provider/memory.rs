//! In-memory provider.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{BoxFuture, Provider, ProviderError};
use crate::record::Record;

/// Provider that returns a fixed set of records.
///
/// Useful for tests, fixtures, and composing with [`GatedProvider`]. An
/// optional delay simulates a slow backing store.
///
/// [`GatedProvider`]: super::GatedProvider
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    records: Vec<Record>,
    delay: Option<Duration>,
}

impl StaticProvider {
    pub fn new(name: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            records,
            delay: None,
        }
    }

    /// Waits `delay` before returning records from each attempt.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl Provider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Record>, ProviderError>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Ok(self.records.clone())
        })
    }
}
