//! Runs the configured workers concurrently and stops all of them once one fails.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use stampfill_client::Client;

use crate::config::Config;
use crate::remote::HttpRemote;
use crate::stop::StopSignal;
use crate::summary::Summary;
use crate::worker::Worker;

/// Runs all workers from the given configuration against the configured node.
///
/// Returns once every worker has finished. A failing worker does not make this function fail,
/// see [`Summary::first_failure`] instead.
pub async fn run(config: &Config) -> Result<Summary> {
    let mut builder = Client::builder(config.base_url.as_str());
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build().context("failed to create node client")?;
    let remote = Arc::new(HttpRemote::new(client));

    let payload_size = usize::try_from(config.payload_size.as_u64())
        .context("payload_size exceeds the addressable memory")?;

    let stop = StopSignal::new();
    let workers = config
        .workers
        .iter()
        .map(|worker| {
            Worker::new(worker.clone(), remote.clone(), remote.clone(), stop.clone())
                .payload_size(payload_size)
                .poll_interval(config.poll_interval)
        })
        .collect();

    Ok(run_all(workers, stop).await)
}

/// Runs the given workers concurrently, each on its own task.
///
/// The first worker to fail sends its error on `stop`, which makes all other workers stop at
/// their next iteration. If no worker fails, the signal is never sent.
pub async fn run_all(workers: Vec<Worker>, stop: StopSignal) -> Summary {
    let mut tasks: FuturesUnordered<_> = workers
        .into_iter()
        .enumerate()
        .map(|(index, worker)| {
            let name = worker.name().to_owned();
            let stop = stop.clone();
            let handle = tokio::spawn(async move {
                let report = worker.run().await;
                match &report.result {
                    Ok(outcome) => tracing::info!(
                        worker = %report.name,
                        %outcome,
                        uploads = report.uploads,
                        "worker finished"
                    ),
                    Err(error) => {
                        tracing::error!(
                            worker = %report.name,
                            error = error as &dyn std::error::Error,
                            "worker failed"
                        );
                        stop.send(anyhow!("worker `{}` failed: {error}", report.name));
                    }
                }
                report
            });
            async move { (index, name, handle.await) }
        })
        .collect();

    let mut reports = Vec::with_capacity(tasks.len());
    while let Some((index, name, joined)) = tasks.next().await {
        match joined {
            Ok(report) => reports.push((index, report)),
            Err(error) => {
                tracing::error!(
                    worker = %name,
                    error = &error as &dyn std::error::Error,
                    "worker task panicked"
                );
                stop.send(anyhow!("worker `{name}` panicked"));
            }
        }
    }

    reports.sort_by_key(|(index, _)| *index);
    Summary::new(reports.into_iter().map(|(_, report)| report).collect(), stop)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use stampfill_client::{Batch, BatchId, Reference, StatusCode, UploadOptions};
    use tempfile::TempDir;

    use crate::config::WorkerConfig;
    use crate::remote::{BatchStatusClient, UploadClient};
    use crate::worker::{Outcome, WorkerError};

    use super::*;

    /// A node serving one batch whose utilization grows by `step` per upload.
    #[derive(Debug)]
    struct GrowingBatch {
        batch_id: BatchId,
        step: u32,
        fail_upload_at: Option<usize>,
        attempts: AtomicUsize,
        utilization: Mutex<u32>,
        expire_at: Option<u32>,
    }

    impl GrowingBatch {
        fn new(batch_id: &str, step: u32) -> Self {
            Self {
                batch_id: batch_id.parse().unwrap(),
                step,
                fail_upload_at: None,
                attempts: AtomicUsize::new(0),
                utilization: Mutex::new(0),
                expire_at: None,
            }
        }

        fn attempts(&self) -> usize {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BatchStatusClient for GrowingBatch {
        async fn fetch(&self, batch_id: &BatchId) -> stampfill_client::Result<Batch> {
            assert_eq!(batch_id, &self.batch_id);
            let utilization = *self.utilization.lock().unwrap();
            Ok(Batch {
                batch_id: batch_id.clone(),
                utilization,
                expired: self.expire_at.is_some_and(|at| utilization >= at),
                usable: true,
            })
        }
    }

    #[async_trait]
    impl UploadClient for GrowingBatch {
        async fn upload(
            &self,
            _payload: Bytes,
            _batch_id: &BatchId,
            _options: UploadOptions,
        ) -> stampfill_client::Result<Reference> {
            tokio::task::yield_now().await;

            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_upload_at == Some(attempt) {
                return Err(stampfill_client::Error::UnexpectedStatus {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "connection reset".into(),
                });
            }

            *self.utilization.lock().unwrap() += self.step;
            Ok(Reference::from(format!("{attempt:064x}")))
        }
    }

    fn worker(dir: &TempDir, name: &str, node: &Arc<GrowingBatch>, stop: &StopSignal) -> Worker {
        let config = WorkerConfig {
            name: name.into(),
            batch_id: node.batch_id.clone(),
            encrypt: false,
            deferred: false,
            log_file: dir.path().join(format!("{name}.log")),
        };
        Worker::new(config, node.clone(), node.clone(), stop.clone()).payload_size(16)
    }

    #[tokio::test]
    async fn all_workers_finish_without_signal() {
        let dir = tempfile::tempdir().unwrap();
        let full = Arc::new(GrowingBatch::new("aaaa", 4));
        let expiring = Arc::new(GrowingBatch {
            expire_at: Some(2),
            ..GrowingBatch::new("bbbb", 1)
        });

        let stop = StopSignal::new();
        let workers = vec![
            worker(&dir, "full", &full, &stop),
            worker(&dir, "expiring", &expiring, &stop),
        ];
        let summary = run_all(workers, stop).await;

        assert!(summary.first_failure().is_none());
        let [first, second] = summary.reports.as_slice() else {
            panic!("expected two reports");
        };
        assert_eq!(first.name, "full");
        assert_eq!(*first.result.as_ref().unwrap(), Outcome::Full);
        assert_eq!(first.uploads, 4);
        assert_eq!(second.name, "expiring");
        assert_eq!(*second.result.as_ref().unwrap(), Outcome::Expired);
        assert_eq!(second.uploads, 2);
    }

    #[tokio::test]
    async fn failure_stops_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let failing = Arc::new(GrowingBatch {
            fail_upload_at: Some(3),
            ..GrowingBatch::new("aaaa", 0)
        });
        // never fills up, only the stop signal ends this worker
        let endless = Arc::new(GrowingBatch::new("bbbb", 0));

        let stop = StopSignal::new();
        let workers = vec![
            worker(&dir, "failing", &failing, &stop),
            worker(&dir, "endless", &endless, &stop),
        ];
        let summary = run_all(workers, stop).await;

        let [failed, stopped] = summary.reports.as_slice() else {
            panic!("expected two reports");
        };
        assert!(matches!(failed.result, Err(WorkerError::Upload(_))));
        assert_eq!(failed.uploads, 2);
        assert_eq!(*stopped.result.as_ref().unwrap(), Outcome::Stopped);

        // the sibling stopped at an iteration boundary, without an upload left unaccounted
        assert_eq!(stopped.uploads as usize, endless.attempts());

        let reason = summary.first_failure().unwrap();
        assert!(
            reason.to_string().starts_with("worker `failing` failed:"),
            "{reason}"
        );

        let log = std::fs::read_to_string(dir.path().join("endless.log")).unwrap();
        assert!(log.contains("stopping: worker `failing` failed"), "{log}");
    }

    #[tokio::test]
    async fn only_first_failure_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let first = Arc::new(GrowingBatch {
            fail_upload_at: Some(1),
            ..GrowingBatch::new("aaaa", 0)
        });
        let second = Arc::new(GrowingBatch {
            fail_upload_at: Some(1),
            ..GrowingBatch::new("bbbb", 0)
        });

        let stop = StopSignal::new();
        let workers = vec![
            worker(&dir, "first", &first, &stop),
            worker(&dir, "second", &second, &stop),
        ];
        let summary = run_all(workers, stop).await;

        assert_eq!(summary.failures().count(), 2);
        let reason = summary.first_failure().unwrap().to_string();
        assert!(
            reason.starts_with("worker `first`") || reason.starts_with("worker `second`"),
            "{reason}"
        );
    }

    #[tokio::test]
    async fn empty_run() {
        let summary = run_all(Vec::new(), StopSignal::new()).await;
        assert!(summary.reports.is_empty());
        assert!(summary.first_failure().is_none());
    }

    #[tokio::test]
    async fn reports_keep_worker_order() {
        let dir = tempfile::tempdir().unwrap();
        let stop = StopSignal::new();
        let nodes: Vec<_> = ["cccc", "aaaa", "bbbb"]
            .into_iter()
            .map(|id| Arc::new(GrowingBatch::new(id, 16)))
            .collect();
        let workers = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| worker(&dir, &format!("worker-{i}"), node, &stop))
            .collect();

        let summary = run_all(workers, stop).await;
        let names: Vec<_> = summary.reports.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["worker-0", "worker-1", "worker-2"]);
    }
}
