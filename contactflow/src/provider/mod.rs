//! Record provider abstraction
//!
//! This module provides the [`Provider`] trait for sources of contact records,
//! the [`ProviderDriver`] that runs a provider for one aggregation run, and
//! the built-in implementations:
//!
//! - [`StaticProvider`] - fixed in-memory records
//! - [`JsonFileProvider`] - records read from a JSON file
//! - [`GatedProvider`] - wraps another provider behind an [`Authorizer`]
//!
//! # Authorization Challenges
//!
//! A provider reports [`ProviderError::AuthorizationRequired`] when it cannot
//! proceed without an external grant. The driver turns that into a
//! [`ProviderEventKind::AuthorizationRequired`] event carrying an
//! [`AuthorizationContinuation`]; resuming the continuation repeats the
//! attempt.
//!
//! ```ignore
//! use contactflow::provider::{GatedProvider, JsonFileProvider, SharedAuthorizer};
//!
//! let authorizer = SharedAuthorizer::default();
//! let provider = GatedProvider::new(JsonFileProvider::new("contacts.json"), authorizer.clone());
//! // Hand `provider` to a DataSource; on a challenge call `authorizer.grant()`
//! // and then `continuation.resume()`.
//! ```

mod driver;
mod event;
mod gated;
mod json_file;
mod memory;
mod types;

pub use driver::ProviderDriver;
pub use event::{AuthorizationContinuation, ProviderEvent, ProviderEventKind};
pub use gated::{AuthorizationStatus, Authorizer, GatedProvider, SharedAuthorizer};
pub use json_file::JsonFileProvider;
pub use memory::StaticProvider;
pub use types::{BoxFuture, Provider, ProviderError, ProviderState};
