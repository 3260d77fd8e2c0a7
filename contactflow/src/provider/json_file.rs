//! Provider backed by a JSON contacts file.
//!
//! The file holds an array of record documents:
//!
//! ```json
//! [
//!   {"id": "1", "given_name": "Ada", "phone_numbers": ["555-0100"]},
//!   {"id": "2", "given_name": "Grace", "email_addresses": ["grace@example.com"]}
//! ]
//! ```
//!
//! Ids may be strings or integers; `null` fields are skipped.

use std::io;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{BoxFuture, Provider, ProviderError};
use crate::record::Record;

/// Reads records from a JSON file on every acquisition attempt.
#[derive(Debug, Clone)]
pub struct JsonFileProvider {
    name: String,
    path: PathBuf,
}

impl JsonFileProvider {
    /// Creates a provider named after the file stem.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { name, path }
    }

    /// Overrides the provider name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Provider for JsonFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn acquire<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Vec<Record>, ProviderError>> {
        Box::pin(async move {
            let bytes = tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = tokio::fs::read(&self.path) => result.map_err(|e| map_io_error(&self.path, e))?,
            };
            debug!(path = %self.path.display(), bytes = bytes.len(), "Read contacts file");

            serde_json::from_slice::<Vec<Record>>(&bytes)
                .map_err(|e| ProviderError::Parse(format!("{}: {}", self.path.display(), e)))
        })
    }
}

fn map_io_error(path: &Path, error: io::Error) -> ProviderError {
    match error.kind() {
        io::ErrorKind::NotFound => ProviderError::Unavailable(path.display().to_string()),
        io::ErrorKind::PermissionDenied => ProviderError::AccessDenied(path.display().to_string()),
        _ => ProviderError::Io(format!("{}: {}", path.display(), error)),
    }
}
