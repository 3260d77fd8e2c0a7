//! contactflow - contact aggregation and post-processing pipeline
//!
//! This library loads contact records from several providers concurrently,
//! merges them into one set, runs an ordered chain of post-processors over
//! the set, and reports when the result is ready.
//!
//! # Modules
//!
//! - [`record`] - records, property keys and typed values
//! - [`provider`] - record sources and the authorization challenge flow
//! - [`processor`] - post-processors and the processor chain
//! - [`datasource`] - the aggregator that drives a run end to end
//! - [`config`] - INI configuration file
//! - [`logging`] - tracing subscriber setup

pub mod config;
pub mod datasource;
pub mod logging;
pub mod ordered;
pub mod processor;
pub mod provider;
pub mod record;

pub use datasource::{
    ContactSet, DataSource, DataSourceConfig, DataSourceError, DataSourceEvent, DataSourceRun,
    RunState,
};
pub use ordered::OrderedSet;
pub use record::{PropertyKey, PropertyValue, Record, RecordId, TypedKey};
