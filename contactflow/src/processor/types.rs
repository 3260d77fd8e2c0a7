//! Post-processor trait and errors.

use thiserror::Error;

use crate::record::{PropertyKey, PropertyTypeError, Record};

/// A pipeline stage that annotates records with derived properties.
///
/// Post-processors run after every provider has completed, strictly one at a
/// time and in registration order, each over the full merged record set.
/// A processor may add or overwrite properties on any record; it must not
/// keep state from one run to the next.
///
/// [`reads`](Self::reads) and [`writes`](Self::writes) declare the keys the
/// processor depends on and produces. They are used to check chain ordering
/// and carry no runtime enforcement.
pub trait PostProcessor: Send + Sync {
    /// Returns a human-readable name for logging.
    fn name(&self) -> &str;

    /// Keys this processor reads.
    fn reads(&self) -> Vec<PropertyKey> {
        Vec::new()
    }

    /// Keys this processor writes.
    fn writes(&self) -> Vec<PropertyKey>;

    /// Annotates the records in place.
    fn process(&self, records: &mut [Record]) -> Result<(), ProcessorError>;
}

/// Errors a post-processor can report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessorError {
    /// A record property had an unusable type.
    #[error("Record {record}: {source}")]
    InvalidProperty {
        record: String,
        #[source]
        source: PropertyTypeError,
    },

    /// A record property had an unusable shape.
    #[error("Record {record}: property '{key}' is a {found}, expected {expected}")]
    UnexpectedShape {
        record: String,
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Any other processor-specific failure.
    #[error("{0}")]
    Other(String),
}
