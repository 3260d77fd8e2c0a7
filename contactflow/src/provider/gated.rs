//! Authorization gate for providers backed by a protected contacts store.
//!
//! Platform contact stores are readable only after the user grants access.
//! [`GatedProvider`] consults an [`Authorizer`] before each attempt:
//!
//! | Status          | Attempt result                          |
//! |-----------------|-----------------------------------------|
//! | `NotDetermined` | `AuthorizationRequired` (recoverable)   |
//! | `Authorized`    | delegates to the wrapped provider       |
//! | `Denied`        | `AccessDenied` (fatal)                  |
//! | `Restricted`    | `AccessDenied` (fatal)                  |
//!
//! The external authorization flow updates the status (for example through
//! [`SharedAuthorizer::grant`]) and then resumes the continuation it was
//! handed, which makes the driver call [`Provider::acquire`] again.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::{BoxFuture, Provider, ProviderError};
use crate::record::Record;

/// Access status of a protected store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    NotDetermined,
    /// Access granted.
    Authorized,
    /// Access explicitly refused.
    Denied,
    /// Access blocked by policy; the user cannot grant it.
    Restricted,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthorizationStatus::NotDetermined => "not determined",
            AuthorizationStatus::Authorized => "authorized",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Restricted => "restricted",
        };
        f.write_str(s)
    }
}

/// Reports the current access status of a protected store.
pub trait Authorizer: Send + Sync {
    fn status(&self) -> AuthorizationStatus;
}

/// Authorizer whose status is set by the application.
///
/// Cheap to clone; clones share the same status.
#[derive(Debug, Clone)]
pub struct SharedAuthorizer {
    status: Arc<Mutex<AuthorizationStatus>>,
}

impl SharedAuthorizer {
    pub fn new(initial: AuthorizationStatus) -> Self {
        Self {
            status: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn set(&self, status: AuthorizationStatus) {
        *self.status.lock() = status;
    }

    pub fn grant(&self) {
        self.set(AuthorizationStatus::Authorized);
    }

    pub fn deny(&self) {
        self.set(AuthorizationStatus::Denied);
    }
}

impl Default for SharedAuthorizer {
    fn default() -> Self {
        Self::new(AuthorizationStatus::NotDetermined)
    }
}

impl Authorizer for SharedAuthorizer {
    fn status(&self) -> AuthorizationStatus {
        *self.status.lock()
    }
}

/// Wraps a provider behind an authorization check.
pub struct GatedProvider<P, A> {
    inner: P,
    authorizer: A,
}

impl<P: Provider, A: Authorizer> GatedProvider<P, A> {
    pub fn new(inner: P, authorizer: A) -> Self {
        Self { inner, authorizer }
    }

    pub fn authorizer(&self) -> &A {
        &self.authorizer
    }
}

impl<P: Provider, A: Authorizer> Provider for GatedProvider<P, A> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn acquire<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Record>, ProviderError>> {
        match self.authorizer.status() {
            AuthorizationStatus::Authorized => self.inner.acquire(cancel),
            AuthorizationStatus::NotDetermined => {
                let name = self.inner.name().to_string();
                Box::pin(async move { Err(ProviderError::AuthorizationRequired(name)) })
            }
            status @ (AuthorizationStatus::Denied | AuthorizationStatus::Restricted) => {
                let reason = format!("{} ({})", self.inner.name(), status);
                Box::pin(async move { Err(ProviderError::AccessDenied(reason)) })
            }
        }
    }
}
