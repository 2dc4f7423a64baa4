//! Diagnostic output of the load generator.
//!
//! Per-worker progress goes to the worker log files (see [`crate::worker_log`]), everything is
//! additionally emitted through [`tracing`] to stderr.

use std::env;
use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

use crate::config::{LogFormat, Logging};

/// Installs the global tracing subscriber.
///
/// If `RUST_LOG` is set, it is used literally as filter. Otherwise, the configured level applies
/// to the stampfill crates and dependencies are limited to warnings.
pub fn init_tracing(config: &Logging) {
    let env_filter = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => EnvFilter::new(value),
        Err(_) => default_filter(config.level),
    };

    let format = match config.format {
        LogFormat::Auto if std::io::stderr().is_terminal() => LogFormat::Pretty,
        LogFormat::Auto => LogFormat::Simplified,
        format => format,
    };

    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);
    let layer = match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Auto | LogFormat::Simplified => layer.compact().with_ansi(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(env_filter)
        .init();
}

fn default_filter(level: LevelFilter) -> EnvFilter {
    let mut filter = EnvFilter::new("WARN");
    for name in ["stampfill", "stampfill_client"] {
        if let Ok(directive) = format!("{name}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}
