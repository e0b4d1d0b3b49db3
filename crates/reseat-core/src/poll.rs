//! Deletion-confirmation polling.
//!
//! Directory deletes are accepted asynchronously: the delete call returning
//! success does not mean the record is gone. The only confirmation is a
//! subsequent lookup returning not-found, so the migrator blocks here until
//! the record disappears or the timeout elapses.

use std::time::Duration;

use tokio::time::Instant;

use crate::directory::{DeviceDirectory, DirectoryError};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl PollSettings {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self { timeout, interval }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A lookup observed the record as absent.
    Confirmed,
    /// The record was still visible when the timeout elapsed.
    TimedOut,
}

/// Repeatedly look up `serial` until the directory reports it absent or
/// `settings.timeout` elapses. Fixed interval, no backoff: propagation
/// delay is roughly uniform. Blocks the calling task for the whole wait.
pub async fn wait_until_absent(
    directory: &dyn DeviceDirectory,
    serial: &str,
    settings: &PollSettings,
) -> Result<PollOutcome, DirectoryError> {
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if directory.find(serial).await?.is_none() {
            tracing::debug!(serial, attempts, "deletion confirmed");
            return Ok(PollOutcome::Confirmed);
        }

        if started.elapsed() >= settings.timeout {
            tracing::warn!(
                serial,
                attempts,
                timeout_secs = settings.timeout.as_secs(),
                "record still visible after timeout"
            );
            return Ok(PollOutcome::TimedOut);
        }

        tokio::time::sleep(settings.interval).await;
    }
}
