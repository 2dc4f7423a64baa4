//! Append-only, human readable log file of a single worker.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// A per-worker log file.
///
/// Every line has the form `<RFC3339 timestamp> <message>`. Each line is also emitted as a
/// tracing event tagged with the worker name.
#[derive(Debug)]
pub struct WorkerLog {
    worker: String,
    path: PathBuf,
    file: File,
}

impl WorkerLog {
    /// Opens the log file in append mode, creating it if needed.
    pub fn open(worker: &str, path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            worker: worker.to_owned(),
            path: path.to_owned(),
            file,
        })
    }

    /// Appends a single line.
    ///
    /// Failing to write is reported, but never interrupts the worker.
    pub fn line(&mut self, message: impl fmt::Display) {
        let timestamp = humantime::format_rfc3339_seconds(SystemTime::now());
        tracing::info!(worker = %self.worker, "{message}");

        if let Err(error) = writeln!(self.file, "{timestamp} {message}") {
            tracing::warn!(
                worker = %self.worker,
                path = %self.path.display(),
                error = &error as &dyn std::error::Error,
                "failed to write worker log"
            );
        }
    }
}
