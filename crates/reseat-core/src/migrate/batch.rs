//! Batch orchestration: the single-record migrator applied across an
//! ordered task list, strictly serially.
//!
//! Serial execution is the policy, not a limitation: the directory service
//! rate-limits aggressively and the bearer tokens are shared across the
//! whole batch. One task's failure never affects another task; only an
//! auth failure aborts the batch, since it invalidates every later call.

use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::directory::DirectoryError;
use crate::types::MigrationTask;

use super::{MigrationOutcome, Migrator};

/// Outcome of one task, keyed by its serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    pub serial: String,
    #[serde(flatten)]
    pub outcome: MigrationOutcome,
}

/// Per-identifier outcome history plus aggregate tallies for one batch run.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    records: Vec<TaskRecord>,
    cancelled: bool,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TaskRecord] {
        &self.records
    }

    /// The outcome recorded for a serial, if the batch reached it.
    pub fn outcome_for(&self, serial: &str) -> Option<&MigrationOutcome> {
        self.records
            .iter()
            .find(|r| r.serial.eq_ignore_ascii_case(serial))
            .map(|r| &r.outcome)
    }

    /// Tasks that ended `Migrated`.
    pub fn migrated(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::Migrated))
    }

    /// Tasks skipped by dry-run.
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, MigrationOutcome::SkippedDryRun))
    }

    /// Every outcome that is neither a migration nor a dry-run skip.
    pub fn failed(&self) -> usize {
        self.count(|o| !o.succeeded())
    }

    /// True when the run was stopped by cancellation before draining the
    /// task list; the outcomes recorded up to that point are retained.
    pub fn cancelled(&self) -> bool {
        self.cancelled
    }

    fn count(&self, pred: impl Fn(&MigrationOutcome) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.outcome)).count()
    }
}

pub struct BatchMigrator<'a> {
    migrator: Migrator<'a>,
    pacing: Duration,
}

impl<'a> BatchMigrator<'a> {
    pub fn new(migrator: Migrator<'a>, pacing: Duration) -> Self {
        Self { migrator, pacing }
    }

    /// Run every task in order, recording one outcome per task.
    ///
    /// A fixed pacing delay separates consecutive tasks (none after the
    /// last). The cancellation token is checked between items only — an
    /// in-flight task always runs to its terminal outcome.
    pub async fn run(
        &self,
        tasks: &[MigrationTask],
        cancel: &CancellationToken,
    ) -> Result<BatchReport, DirectoryError> {
        let mut records = Vec::with_capacity(tasks.len());
        let mut cancelled = false;

        for (index, task) in tasks.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    completed = records.len(),
                    remaining = tasks.len() - records.len(),
                    "batch cancelled"
                );
                cancelled = true;
                break;
            }

            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let outcome = self.migrator.run(task).await?;
            tracing::info!(serial = %task.serial, %outcome, "task finished");
            records.push(TaskRecord {
                serial: task.serial.clone(),
                outcome,
            });
        }

        let report = BatchReport { records, cancelled };
        tracing::info!(
            total = report.len(),
            migrated = report.migrated(),
            failed = report.failed(),
            "batch finished"
        );
        Ok(report)
    }
}
