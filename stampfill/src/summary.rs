//! The report printed once all workers have finished.

use std::sync::Arc;
use std::time::Duration;

use bytesize::ByteSize;
use stampfill_client::MAX_UTILIZATION;
use yansi::Paint;

use crate::stop::StopSignal;
use crate::worker::WorkerReport;

/// Reports of all workers of a run, in the order the workers were configured.
#[derive(Debug)]
pub struct Summary {
    /// One report per worker that ran to completion.
    pub reports: Vec<WorkerReport>,
    stop: StopSignal,
}

impl Summary {
    pub(crate) fn new(reports: Vec<WorkerReport>, stop: StopSignal) -> Self {
        Self { reports, stop }
    }

    /// The error that stopped the run, if any worker failed.
    pub fn first_failure(&self) -> Option<Arc<anyhow::Error>> {
        self.stop.received()
    }

    /// Reports of all workers that ended with an error.
    pub fn failures(&self) -> impl Iterator<Item = &WorkerReport> {
        self.reports.iter().filter(|report| report.is_failure())
    }

    /// Total bytes uploaded by all workers.
    pub fn total_uploaded(&self) -> u64 {
        self.reports.iter().map(|report| report.total_uploaded).sum()
    }

    /// Prints the per-worker and total report to stdout.
    pub fn print(&self) {
        for report in &self.reports {
            println!();
            println!(
                "{} {} (batch: {})",
                "## Worker".bold(),
                report.name.bold().blue(),
                report.batch_id
            );
            match &report.result {
                Ok(outcome) => println!("{} {}", "FINISHED:".bold().green(), outcome),
                Err(error) => println!("{} {}", "FAILED:".bold().red(), error),
            }
            print_uploads(report.uploads, report.total_uploaded, report.elapsed);
            if let Some(utilization) = report.utilization {
                println!("  utilization: {}/{MAX_UTILIZATION}", utilization.bold());
            }
        }

        let uploads = self.reports.iter().map(|report| report.uploads).sum();
        let elapsed = self
            .reports
            .iter()
            .map(|report| report.elapsed)
            .max()
            .unwrap_or_default();

        println!();
        println!("{}", "## TOTALS".bold());
        print_uploads(uploads, self.total_uploaded(), elapsed);
        if let Some(reason) = self.first_failure() {
            println!("{} {}", "STOPPED:".bold().red(), reason);
        }
    }
}

fn print_uploads(uploads: u64, total: u64, elapsed: Duration) {
    print!(
        "  {} uploads, {} in {:.2?}",
        uploads.bold(),
        ByteSize::b(total).bold(),
        elapsed
    );
    if elapsed.is_zero() {
        println!();
    } else {
        let throughput = (total as f64 / elapsed.as_secs_f64()) as u64;
        println!(", {}/s", ByteSize::b(throughput).bold());
    }
}
