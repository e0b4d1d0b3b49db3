//! Shared core types used across the directory, migration, and export layers.

use serde::{Deserialize, Serialize};

/// A device enrollment record as returned by the directory service.
///
/// This is a read-only snapshot: records are never mutated locally, only
/// deleted at the source and re-created at the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Serial number, the stable cross-tenant join key. Matched
    /// case-insensitively against the remote system.
    pub serial: String,
    /// Opaque id assigned by the directory service. Deletes are addressed
    /// by this id, never by serial.
    pub remote_id: String,
    /// Classification label carried through unmodified during migration.
    pub group_tag: Option<String>,
    pub model: Option<String>,
    pub manufacturer: Option<String>,
}

impl DeviceRecord {
    /// Case-insensitive serial comparison, the match rule the directory
    /// service applies to filter lookups.
    pub fn matches_serial(&self, serial: &str) -> bool {
        self.serial.eq_ignore_ascii_case(serial)
    }
}

/// One unit of migration work: a serial plus the group tag to apply at the
/// target. Built from user input or one row of bulk input; consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationTask {
    pub serial: String,
    pub group_tag: Option<String>,
}

impl MigrationTask {
    pub fn new(serial: impl Into<String>) -> Self {
        Self {
            serial: serial.into(),
            group_tag: None,
        }
    }

    pub fn with_group_tag(mut self, tag: impl Into<String>) -> Self {
        self.group_tag = Some(tag.into());
        self
    }
}

/// Which of the two configured tenants an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TenantRole {
    Source,
    Target,
}

impl std::fmt::Display for TenantRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TenantRole::Source => write!(f, "source"),
            TenantRole::Target => write!(f, "target"),
        }
    }
}
