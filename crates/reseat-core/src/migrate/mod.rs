//! Single-record migration: export from the source tenant, delete, confirm
//! the deletion propagated, re-import into the target tenant.

pub mod batch;

use serde::Serialize;

use crate::directory::{DeviceDirectory, DirectoryError, ImportOutcome};
use crate::poll::{self, PollOutcome, PollSettings};
use crate::types::MigrationTask;

/// Terminal state of one migration task.
///
/// Auth failures are not outcomes: they invalidate every later call in the
/// run and propagate as errors instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason")]
pub enum MigrationOutcome {
    /// The record was imported at the target, or was already there from a
    /// previous partial run.
    Migrated,
    /// The source tenant has no record for this serial.
    NotFoundAtSource,
    /// The source-side removal did not complete; nothing was imported.
    DeleteFailed(String),
    /// The delete was accepted but the record never became absent within
    /// the poll timeout; nothing was imported.
    DeleteTimedOut,
    /// The source record is gone but the target import failed. The record
    /// must be re-imported manually (or by re-running, which is safe).
    ImportFailed(String),
    /// Dry-run: the lookup ran, both mutations were skipped.
    SkippedDryRun,
}

impl MigrationOutcome {
    /// Whether this task should count toward the run's success tally.
    /// Dry-run skips succeed so that `--dry-run` exits zero.
    pub fn succeeded(&self) -> bool {
        matches!(
            self,
            MigrationOutcome::Migrated | MigrationOutcome::SkippedDryRun
        )
    }
}

impl std::fmt::Display for MigrationOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationOutcome::Migrated => write!(f, "migrated"),
            MigrationOutcome::NotFoundAtSource => write!(f, "not found at source"),
            MigrationOutcome::DeleteFailed(reason) => write!(f, "delete failed: {reason}"),
            MigrationOutcome::DeleteTimedOut => write!(f, "delete not confirmed before timeout"),
            MigrationOutcome::ImportFailed(reason) => write!(f, "import failed: {reason}"),
            MigrationOutcome::SkippedDryRun => write!(f, "skipped (dry run)"),
        }
    }
}

/// Orchestrates the per-device state machine against a source and a target
/// directory.
pub struct Migrator<'a> {
    source: &'a dyn DeviceDirectory,
    target: &'a dyn DeviceDirectory,
    poll: PollSettings,
    dry_run: bool,
}

impl<'a> Migrator<'a> {
    pub fn new(
        source: &'a dyn DeviceDirectory,
        target: &'a dyn DeviceDirectory,
        poll: PollSettings,
    ) -> Self {
        Self {
            source,
            target,
            poll,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run one task to a terminal outcome.
    ///
    /// A record is never imported into the target before its deletion from
    /// the source is confirmed by a lookup returning not-found; the delete
    /// call succeeding is not confirmation. Remote failures terminate the
    /// task with the outcome of the phase they occurred in; only auth
    /// failures escape as `Err`.
    pub async fn run(&self, task: &MigrationTask) -> Result<MigrationOutcome, DirectoryError> {
        tracing::info!(serial = %task.serial, dry_run = self.dry_run, "migrating device");

        let record = match self.source.find(&task.serial).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::info!(serial = %task.serial, "no record at source");
                return Ok(MigrationOutcome::NotFoundAtSource);
            }
            Err(e) => {
                // Without a confirmed lookup the source-side removal
                // cannot proceed; nothing has been mutated yet.
                return Ok(MigrationOutcome::DeleteFailed(non_auth(e)?));
            }
        };

        // The tag from the bulk row wins; otherwise carry the source tag.
        let group_tag = task
            .group_tag
            .as_deref()
            .or(record.group_tag.as_deref())
            .map(str::to_owned);

        if self.dry_run {
            tracing::info!(
                serial = %record.serial,
                ?group_tag,
                "dry run: would delete at source and import at target"
            );
            return Ok(MigrationOutcome::SkippedDryRun);
        }

        if let Err(e) = self.source.delete(&record).await {
            tracing::warn!(serial = %record.serial, error = %e, "source delete failed");
            return Ok(MigrationOutcome::DeleteFailed(non_auth(e)?));
        }

        match poll::wait_until_absent(self.source, &record.serial, &self.poll).await {
            Ok(PollOutcome::Confirmed) => {}
            Ok(PollOutcome::TimedOut) => {
                return Ok(MigrationOutcome::DeleteTimedOut);
            }
            Err(e) => {
                let reason = non_auth(e)?;
                return Ok(MigrationOutcome::DeleteFailed(format!(
                    "deletion confirmation failed: {reason}"
                )));
            }
        }

        match self.target.create(&record.serial, group_tag.as_deref()).await {
            Ok(ImportOutcome::Created) => {
                tracing::info!(serial = %record.serial, "imported at target");
                Ok(MigrationOutcome::Migrated)
            }
            Ok(ImportOutcome::AlreadyExists) => {
                tracing::info!(serial = %record.serial, "already present at target");
                Ok(MigrationOutcome::Migrated)
            }
            Err(e) => {
                let reason = non_auth(e)?;
                // The source record is already gone at this point. There is
                // no rollback; the serial must be re-imported manually.
                tracing::error!(
                    serial = %record.serial,
                    error = %reason,
                    "import failed after source deletion; manual re-import required"
                );
                Ok(MigrationOutcome::ImportFailed(reason))
            }
        }
    }
}

/// Auth failures abort the run; everything else becomes the task's reason.
fn non_auth(error: DirectoryError) -> Result<String, DirectoryError> {
    if error.is_auth() {
        Err(error)
    } else {
        Ok(error.to_string())
    }
}
