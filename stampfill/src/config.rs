//! Configuration for the stampfill load generator.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `STAMPFILL__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! See [`Config`] for a description of all configuration fields and their defaults.
//!
//! # Environment Variables
//!
//! Environment variables use `STAMPFILL__` as a prefix and double underscores (`__`) to denote
//! nested configuration structures. For example:
//!
//! - `STAMPFILL__BASE_URL=http://bee-0:1633` sets the node endpoint
//! - `STAMPFILL__PAYLOAD_SIZE=1MiB` sets the size of each upload
//! - `STAMPFILL__LOGGING__LEVEL=debug` sets the log level
//!
//! # YAML Configuration File
//!
//! Workers can only be configured from the file, as each of them needs its own batch:
//!
//! ```yaml
//! base_url: http://localhost:1635
//! payload_size: 5MiB
//! poll_interval: 5s
//!
//! workers:
//!   - name: encrypted
//!     batch_id: 33061094e7281dbc29baf3b825d219d39c6999c8a11572863656225ad9bd287e
//!     encrypt: true
//!     log_file: encrypted.log
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use stampfill_client::{BatchId, UploadOptions};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "STAMPFILL__";

/// Largest accepted payload size. Every upload holds one payload in memory.
pub const MAX_PAYLOAD_SIZE: ByteSize = ByteSize::gib(1);

/// Main configuration struct for the load generator.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the node API.
    ///
    /// # Default
    ///
    /// `http://localhost:1635`
    ///
    /// # Environment Variable
    ///
    /// `STAMPFILL__BASE_URL`
    pub base_url: String,

    /// Size of the random payload sent with every upload.
    ///
    /// # Default
    ///
    /// `5MiB`
    ///
    /// Must be larger than zero and at most [`MAX_PAYLOAD_SIZE`].
    ///
    /// # Environment Variable
    ///
    /// `STAMPFILL__PAYLOAD_SIZE`
    pub payload_size: ByteSize,

    /// Interval between batch polls while waiting for a batch to become usable.
    ///
    /// # Default
    ///
    /// `5s`
    ///
    /// # Environment Variable
    ///
    /// `STAMPFILL__POLL_INTERVAL`
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Connect and read timeout for requests to the node.
    ///
    /// # Default
    ///
    /// `None`, requests wait as long as the transport allows.
    ///
    /// # Environment Variable
    ///
    /// `STAMPFILL__TIMEOUT`
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Logging configuration.
    pub logging: Logging,

    /// The upload workers to run concurrently, each bound to its own batch.
    ///
    /// # Default
    ///
    /// Empty. At least one worker has to be configured.
    pub workers: Vec<WorkerConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1635".to_owned(),
            payload_size: ByteSize::mib(5),
            poll_interval: Duration::from_secs(5),
            timeout: None,
            logging: Logging::default(),
            workers: Vec::new(),
        }
    }
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `STAMPFILL__`)
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML file cannot be read or parsed, if environment variables
    /// cannot be parsed, or if the resulting configuration is not runnable.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.workers.is_empty() {
            bail!("no workers configured");
        }
        if self.payload_size.as_u64() == 0 {
            bail!("payload_size must be larger than zero");
        }
        if self.payload_size > MAX_PAYLOAD_SIZE {
            bail!("payload_size must not exceed {MAX_PAYLOAD_SIZE}");
        }
        if self.poll_interval.is_zero() {
            bail!("poll_interval must be larger than zero");
        }

        let mut names = HashSet::new();
        for worker in &self.workers {
            if !names.insert(worker.name.as_str()) {
                bail!("duplicate worker name `{}`", worker.name);
            }
        }

        Ok(())
    }
}

/// Configuration of a single upload worker.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Name of the worker, used in logs and in the run summary.
    pub name: String,

    /// The postage batch all uploads of this worker are stamped with.
    pub batch_id: BatchId,

    /// Whether uploads are encrypted by the node.
    #[serde(default)]
    pub encrypt: bool,

    /// Whether uploads use deferred mode.
    #[serde(default)]
    pub deferred: bool,

    /// File the worker appends its progress log to.
    pub log_file: PathBuf,
}

impl WorkerConfig {
    /// The flags forwarded with every upload of this worker.
    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            encrypt: self.encrypt,
            deferred: self.deferred,
        }
    }
}

/// Logging configuration.
///
/// Controls the verbosity and format of diagnostic output. Logs are always written to stderr,
/// independently of the per-worker log files.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable takes precedence if it is set.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `STAMPFILL__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `STAMPFILL__LOGGING__FORMAT`
    #[serde(with = "display_fromstr")]
    pub format: LogFormat,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Log output format.
///
/// Parsed case-insensitively, an empty value selects [`LogFormat::Auto`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2025-06-04T12:10:32Z  INFO stampfill::worker: batch full worker="encrypted"
    /// ```
    Simplified,

    /// Dump out JSON lines.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Auto => "auto",
            LogFormat::Pretty => "pretty",
            LogFormat::Simplified => "simplified",
            LogFormat::Json => "json",
        })
    }
}

/// Error returned for an unknown [`LogFormat`].
#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown log format `{}`, expected auto, pretty, simplified or json",
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
