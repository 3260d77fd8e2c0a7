//! Data source configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default capacity of the observer event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Order in which provider contributions are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
    /// Providers contribute in registration order regardless of which finished
    /// first. Deterministic.
    #[default]
    RegistrationOrder,
    /// Providers contribute in the order they completed.
    CompletionOrder,
}

impl FromStr for MergePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "registration" | "registration_order" => Ok(MergePolicy::RegistrationOrder),
            "completion" | "completion_order" => Ok(MergePolicy::CompletionOrder),
            other => Err(format!(
                "unknown merge policy '{}' (expected 'registration' or 'completion')",
                other
            )),
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePolicy::RegistrationOrder => f.write_str("registration"),
            MergePolicy::CompletionOrder => f.write_str("completion"),
        }
    }
}

/// Where the post-processor chain executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// On a blocking worker thread, keeping the event task responsive.
    #[default]
    Worker,
    /// On the task that received the last provider completion.
    Inline,
}

impl FromStr for ProcessingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "worker" => Ok(ProcessingMode::Worker),
            "inline" => Ok(ProcessingMode::Inline),
            other => Err(format!(
                "unknown processing mode '{}' (expected 'worker' or 'inline')",
                other
            )),
        }
    }
}

impl fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingMode::Worker => f.write_str("worker"),
            ProcessingMode::Inline => f.write_str("inline"),
        }
    }
}

/// Configuration for a [`DataSource`](super::DataSource).
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceConfig {
    /// Merge order of provider contributions.
    pub merge_policy: MergePolicy,

    /// Where post-processors run.
    pub processing: ProcessingMode,

    /// Maximum time to wait for every provider to complete.
    ///
    /// `None` waits indefinitely; a provider that never completes keeps the
    /// run in `Loading`.
    pub load_timeout: Option<Duration>,

    /// Capacity of the observer broadcast channel.
    pub event_capacity: usize,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            merge_policy: MergePolicy::default(),
            processing: ProcessingMode::default(),
            load_timeout: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl DataSourceConfig {
    /// Set the merge policy.
    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    /// Set the processing mode.
    pub fn with_processing(mut self, mode: ProcessingMode) -> Self {
        self.processing = mode;
        self
    }

    /// Set the load timeout.
    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = Some(timeout);
        self
    }

    /// Set the observer channel capacity (minimum 1).
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }
}
