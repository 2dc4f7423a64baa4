//! The upload worker: one run of the batch lifecycle for a single postage batch.
//!
//! A worker first polls its batch until the node reports it as usable. It then uploads random
//! payloads, re-polling the batch after every upload, until the batch expires, fills up, or a
//! sibling worker sends the [`StopSignal`]. The stop signal is only checked between iterations,
//! an upload in flight always runs to completion.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytesize::ByteSize;
use stampfill_client::{Batch, BatchId, MAX_UTILIZATION};
use tokio::time::Instant;

use crate::config::WorkerConfig;
use crate::payload::{self, PayloadError};
use crate::remote::{BatchStatusClient, UploadClient};
use crate::stop::StopSignal;
use crate::worker_log::WorkerLog;

/// Default size of every uploaded payload.
pub const DEFAULT_PAYLOAD_SIZE: usize = 5 * 1024 * 1024;

/// Default interval between polls while waiting for a batch to become usable.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How a worker run ended without an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A sibling worker failed and sent the stop signal.
    Stopped,
    /// The batch expired.
    Expired,
    /// The batch reached full utilization.
    Full,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Stopped => "stopped",
            Outcome::Expired => "batch expired",
            Outcome::Full => "batch full",
        })
    }
}

/// Errors that end a worker run.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The worker log could not be opened.
    #[error("failed to open log file {}: {source}", path.display())]
    Startup {
        /// Path of the log file.
        path: PathBuf,
        /// The underlying IO error.
        source: std::io::Error,
    },
    /// Polling the batch state failed.
    #[error("failed to fetch batch status: {0}")]
    Status(#[source] stampfill_client::Error),
    /// Uploading a payload failed.
    #[error("failed to upload payload: {0}")]
    Upload(#[source] stampfill_client::Error),
    /// No payload could be generated.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

/// The result of a worker run, along with the progress it made.
#[derive(Debug)]
pub struct WorkerReport {
    /// Name of the worker.
    pub name: String,
    /// The batch the worker uploaded against.
    pub batch_id: BatchId,
    /// How the run ended.
    pub result: Result<Outcome, WorkerError>,
    /// Number of completed upload iterations.
    pub uploads: u64,
    /// Bytes uploaded in completed iterations.
    pub total_uploaded: u64,
    /// Utilization reported by the most recent poll, if the batch was polled successfully.
    pub utilization: Option<u32>,
    /// Wall time of the run.
    pub elapsed: Duration,
}

impl WorkerReport {
    /// Returns `true` if the worker ended with an error.
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }
}

#[derive(Debug, Default)]
struct Progress {
    uploads: u64,
    total_uploaded: u64,
    utilization: Option<u32>,
}

impl Progress {
    fn observe(&mut self, worker: &str, batch: &Batch) {
        if let Some(previous) = self.utilization {
            if batch.utilization < previous {
                tracing::warn!(
                    worker,
                    previous,
                    current = batch.utilization,
                    "batch utilization decreased"
                );
            }
        }
        if batch.utilization > MAX_UTILIZATION {
            tracing::warn!(
                worker,
                utilization = batch.utilization,
                "batch utilization above maximum"
            );
        }
        self.utilization = Some(batch.utilization);
    }
}

/// Runs the batch lifecycle for one configured worker.
#[derive(Debug)]
pub struct Worker {
    config: WorkerConfig,
    payload_size: usize,
    poll_interval: Duration,
    status: Arc<dyn BatchStatusClient>,
    uploader: Arc<dyn UploadClient>,
    stop: StopSignal,
}

impl Worker {
    /// Creates a worker using the given clients and the default payload size and poll interval.
    pub fn new(
        config: WorkerConfig,
        status: Arc<dyn BatchStatusClient>,
        uploader: Arc<dyn UploadClient>,
        stop: StopSignal,
    ) -> Self {
        Self {
            config,
            payload_size: DEFAULT_PAYLOAD_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            status,
            uploader,
            stop,
        }
    }

    /// Size of every uploaded payload in bytes.
    pub fn payload_size(mut self, payload_size: usize) -> Self {
        self.payload_size = payload_size;
        self
    }

    /// Interval between polls while waiting for the batch to become usable.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The name of this worker.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Runs the worker until its batch is exhausted, it is stopped, or an error occurs.
    pub async fn run(self) -> WorkerReport {
        let start = Instant::now();
        let mut progress = Progress::default();
        let result = self.execute(&mut progress).await;

        WorkerReport {
            name: self.config.name,
            batch_id: self.config.batch_id,
            result,
            uploads: progress.uploads,
            total_uploaded: progress.total_uploaded,
            utilization: progress.utilization,
            elapsed: start.elapsed(),
        }
    }

    async fn execute(&self, progress: &mut Progress) -> Result<Outcome, WorkerError> {
        let mut log = WorkerLog::open(&self.config.name, &self.config.log_file).map_err(|source| {
            WorkerError::Startup {
                path: self.config.log_file.clone(),
                source,
            }
        })?;

        let result = self.lifecycle(&mut log, progress).await;
        if let Err(ref error) = result {
            log.line(format_args!("error: {error}"));
        }
        result
    }

    async fn lifecycle(
        &self,
        log: &mut WorkerLog,
        progress: &mut Progress,
    ) -> Result<Outcome, WorkerError> {
        let Some(batch) = self.await_usable(log).await? else {
            return Ok(Outcome::Stopped);
        };
        progress.observe(&self.config.name, &batch);

        let options = self.config.upload_options();
        loop {
            if let Some(reason) = self.stop.received() {
                log.line(format_args!("stopping: {reason}"));
                return Ok(Outcome::Stopped);
            }

            let payload = payload::generate(self.payload_size)?;
            let reference = self
                .uploader
                .upload(payload, &self.config.batch_id, options)
                .await
                .map_err(WorkerError::Upload)?;
            tracing::debug!(worker = %self.config.name, %reference, "payload uploaded");

            let batch = self
                .status
                .fetch(&self.config.batch_id)
                .await
                .map_err(WorkerError::Status)?;

            progress.uploads += 1;
            progress.total_uploaded += self.payload_size as u64;
            progress.observe(&self.config.name, &batch);
            log.line(format_args!(
                "totalUploaded={} utilization={}",
                ByteSize::b(progress.total_uploaded),
                batch.utilization
            ));

            if batch.expired {
                log.line(Outcome::Expired);
                return Ok(Outcome::Expired);
            }
            if batch.is_full() {
                log.line(Outcome::Full);
                return Ok(Outcome::Full);
            }
        }
    }

    /// Polls the batch until it is usable. Returns `None` if the stop signal arrives first.
    async fn await_usable(&self, log: &mut WorkerLog) -> Result<Option<Batch>, WorkerError> {
        let mut batch = Batch::placeholder(self.config.batch_id.clone());
        log.line(format_args!("batchID={}", batch.batch_id));

        loop {
            log.line("waiting for batch to become usable");
            batch = self
                .status
                .fetch(&self.config.batch_id)
                .await
                .map_err(WorkerError::Status)?;

            if batch.usable {
                return Ok(Some(batch));
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.stop.cancelled() => {
                    if let Some(reason) = self.stop.received() {
                        log.line(format_args!("stopping: {reason}"));
                    }
                    return Ok(None);
                }
            }
        }
    }
}
