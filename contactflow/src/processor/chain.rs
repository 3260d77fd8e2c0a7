//! Sequential post-processor chain.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use super::{PostProcessor, ProcessorError};
use crate::ordered::OrderedSet;
use crate::record::{PropertyKey, Record};

/// A processor in the chain failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Post-processor '{processor}' failed: {source}")]
pub struct ChainError {
    pub processor: String,
    #[source]
    pub source: ProcessorError,
}

/// How a declared read is not satisfied by earlier processors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyProblem {
    /// The key is only written by a processor registered later.
    WrittenLater { writer: String },
    /// No processor writes the key.
    NeverWritten,
}

/// A processor reads a derived key no earlier processor writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyIssue {
    pub reader: String,
    pub key: PropertyKey,
    pub problem: DependencyProblem,
}

impl fmt::Display for DependencyIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            DependencyProblem::WrittenLater { writer } => write!(
                f,
                "'{}' reads '{}' which is only written later by '{}'",
                self.reader, self.key, writer
            ),
            DependencyProblem::NeverWritten => write!(
                f,
                "'{}' reads '{}' which no processor writes",
                self.reader, self.key
            ),
        }
    }
}

/// Ordered post-processors, run one after another.
#[derive(Clone, Default)]
pub struct ProcessorChain {
    processors: OrderedSet<dyn PostProcessor>,
}

impl ProcessorChain {
    pub fn new(processors: OrderedSet<dyn PostProcessor>) -> Self {
        Self { processors }
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.processors.iter().map(|p| p.name().to_string()).collect()
    }

    /// Finds derived keys read before any processor has written them.
    ///
    /// Base keys are supplied by providers and are never reported.
    pub fn dependency_issues(&self) -> Vec<DependencyIssue> {
        let declared: Vec<(String, Vec<PropertyKey>, Vec<PropertyKey>)> = self
            .processors
            .iter()
            .map(|p| (p.name().to_string(), p.reads(), p.writes()))
            .collect();

        let mut issues = Vec::new();
        for (index, (reader, reads, _)) in declared.iter().enumerate() {
            for key in reads.iter().filter(|key| key.is_derived()) {
                let written_before = declared[..index]
                    .iter()
                    .any(|(_, _, writes)| writes.contains(key));
                if written_before {
                    continue;
                }

                let later_writer = declared[index + 1..]
                    .iter()
                    .find(|(_, _, writes)| writes.contains(key))
                    .map(|(name, _, _)| name.clone());

                issues.push(DependencyIssue {
                    reader: reader.clone(),
                    key: key.clone(),
                    problem: match later_writer {
                        Some(writer) => DependencyProblem::WrittenLater { writer },
                        None => DependencyProblem::NeverWritten,
                    },
                });
            }
        }
        issues
    }

    /// Logs every dependency issue at warn level.
    pub fn warn_dependency_issues(&self) {
        for issue in self.dependency_issues() {
            warn!(%issue, "Post-processor ordering issue");
        }
    }

    /// Runs every processor over `records` in registration order.
    ///
    /// Stops at the first failure. Returns the number of processors run.
    pub fn run(&self, records: &mut [Record]) -> Result<usize, ChainError> {
        for processor in self.processors.iter() {
            let started = Instant::now();
            processor.process(records).map_err(|source| ChainError {
                processor: processor.name().to_string(),
                source,
            })?;
            debug!(
                processor = processor.name(),
                records = records.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Post-processor finished"
            );
        }
        Ok(self.processors.len())
    }
}

impl From<OrderedSet<dyn PostProcessor>> for ProcessorChain {
    fn from(processors: OrderedSet<dyn PostProcessor>) -> Self {
        Self::new(processors)
    }
}

impl FromIterator<Arc<dyn PostProcessor>> for ProcessorChain {
    fn from_iter<I: IntoIterator<Item = Arc<dyn PostProcessor>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl fmt::Debug for ProcessorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorChain")
            .field("processors", &self.names())
            .finish()
    }
}
