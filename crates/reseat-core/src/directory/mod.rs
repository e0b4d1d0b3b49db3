//! The directory-service seam: every remote read or mutation the rest of
//! the crate performs goes through [`DeviceDirectory`].
//!
//! A not-found lookup is `Ok(None)`, never an error; an already-enrolled
//! conflict on import is [`ImportOutcome::AlreadyExists`], never an error.
//! Both are decoded from transport status codes, not from message text.

pub mod http;

use async_trait::async_trait;

use crate::types::DeviceRecord;

pub use http::HttpDirectoryClient;

/// Errors from directory-service calls.
///
/// `Auth` invalidates every subsequent call in the run and aborts batches;
/// the other variants are scoped to the call that produced them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DirectoryError {
    #[error("authentication against {endpoint} failed: {message}")]
    Auth { endpoint: String, message: String },

    #[error("directory call failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("transport error: {message}")]
    Transport { message: String },
}

impl DirectoryError {
    pub fn is_auth(&self) -> bool {
        matches!(self, DirectoryError::Auth { .. })
    }
}

/// Result of an import (create) call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportOutcome {
    Created,
    /// The target already holds a record for this serial. Treated as
    /// success by the migrator so re-runs stay idempotent.
    AlreadyExists,
}

/// Authenticated access to one tenant's device directory.
///
/// Implementations must not cache lookups: a `find` immediately after a
/// `delete` has to observe the remote system, not local memory — the
/// deletion-confirmation poll depends on it.
#[async_trait]
pub trait DeviceDirectory: Send + Sync {
    /// Look up a record by serial. A not-found response is `Ok(None)`.
    async fn find(&self, serial: &str) -> Result<Option<DeviceRecord>, DirectoryError>;

    /// Full inventory, following the service's continuation cursor until
    /// exhausted.
    async fn list_all(&self) -> Result<Vec<DeviceRecord>, DirectoryError>;

    /// Delete a record, addressed by its remote id. Success here means the
    /// service accepted the request; the record may still be visible to
    /// lookups until deletion propagates.
    async fn delete(&self, record: &DeviceRecord) -> Result<(), DirectoryError>;

    /// Register a serial (with an optional group tag) in this directory.
    async fn create(
        &self,
        serial: &str,
        group_tag: Option<&str>,
    ) -> Result<ImportOutcome, DirectoryError>;
}
