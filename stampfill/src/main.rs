//! Fills postage batches on a storage node with random uploads until they are full or expired.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use argh::FromArgs;

use stampfill::config::Config;
use stampfill::observability::init_tracing;

/// Uploads random data against postage batches until they are full or expired
#[derive(Debug, FromArgs)]
pub struct Args {
    /// path to the yaml configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let config = Config::load(args.config.as_deref()).context("failed to load config")?;
    init_tracing(&config.logging);
    tracing::debug!(?config);

    let summary = stampfill::run(&config).await?;
    summary.print();

    if let Some(reason) = summary.first_failure() {
        bail!("{reason}");
    }

    Ok(())
}
