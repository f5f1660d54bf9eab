//! Configuration for the benchmark binary.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Command-line flags
//! 2. Environment variables (prefixed with `BB__`)
//! 3. YAML configuration file (specified via `-c` or `--config` flag)
//! 4. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `BB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `BB__WORKERS=16` sets the size of the worker pool
//! - `BB__STORAGE__TYPE=filesystem` selects the local filesystem backend
//! - `BB__STORAGE__PATH=/data` sets its root directory
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! workers: 16
//!
//! storage:
//!   type: filesystem
//!   path: /data
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use bytesize::ByteSize;
use figment::providers::{Env, Format, Serialized, Yaml};
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::benchmark::BenchmarkConfig;
use crate::keyspace::{DEFAULT_KEYSPACE_SIZE, Keyspace};

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "BB__";

/// Newtype around `String` that protects against accidental logging of secrets in our
/// configuration struct. Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    /// Returns the secret value.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_owned())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Storage backend holding the benchmarked objects.
///
/// The `type` field in YAML or `__TYPE` in environment variables determines which variant is
/// used.
#[derive(Debug, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Storage {
    /// S3-compatible HTTP service (type `"s3compatible"`).
    ///
    /// Objects are fetched path-style from `<endpoint>/<bucket>/<key>`.
    ///
    /// # Example
    ///
    /// ```yaml
    /// storage:
    ///   type: s3compatible
    ///   endpoint: http://localhost:9000
    /// ```
    S3Compatible {
        /// Service endpoint URL.
        ///
        /// # Default
        ///
        /// `https://s3.<region>.amazonaws.com`
        ///
        /// # Environment Variables
        ///
        /// - `BB__STORAGE__TYPE=s3compatible`
        /// - `BB__STORAGE__ENDPOINT=http://localhost:9000`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,

        /// Bearer token sent with every request.
        ///
        /// # Environment Variables
        ///
        /// - `BB__STORAGE__TOKEN`
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<SecretBox<ConfigSecret>>,
    },

    /// Local filesystem (type `"filesystem"`).
    ///
    /// Objects are read from `<path>/<bucket>/<key>`. Useful to measure local disks and to
    /// try out the harness without a storage service.
    ///
    /// # Environment Variables
    ///
    /// - `BB__STORAGE__TYPE=filesystem`
    /// - `BB__STORAGE__PATH=/path/to/objects`
    FileSystem {
        /// Root directory of the object tree.
        path: PathBuf,
    },
}

impl Default for Storage {
    fn default() -> Self {
        Storage::S3Compatible {
            endpoint: None,
            token: None,
        }
    }
}

/// Stepping of the worker count across consecutive runs.
///
/// Used in: [`Config::sweep`]
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct Sweep {
    /// Largest worker count to run with.
    ///
    /// # Environment Variable
    ///
    /// `BB__SWEEP__UNTIL`
    pub until: usize,

    /// Increment of the worker count between runs.
    ///
    /// # Default
    ///
    /// `5`
    ///
    /// # Environment Variable
    ///
    /// `BB__SWEEP__STEP`
    #[serde(default = "default_sweep_step")]
    pub step: usize,
}

fn default_sweep_step() -> usize {
    5
}

/// Parameters of the `seed` command.
///
/// Used in: [`Config::seed`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Seed {
    /// Size of every uploaded object.
    ///
    /// # Default
    ///
    /// `8 MiB`
    ///
    /// # Environment Variable
    ///
    /// `BB__SEED__OBJECT_SIZE`
    pub object_size: ByteSize,

    /// Maximum number of concurrent uploads.
    ///
    /// # Default
    ///
    /// `8`
    ///
    /// # Environment Variable
    ///
    /// `BB__SEED__CONCURRENCY`
    pub concurrency: usize,
}

impl Default for Seed {
    fn default() -> Self {
        Self {
            object_size: ByteSize::mib(8),
            concurrency: 8,
        }
    }
}

/// Log output format.
///
/// Controls how log messages are formatted. The format can be explicitly specified or
/// auto-detected based on whether output is to a TTY.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Auto detect the best format.
    ///
    /// This chooses [`LogFormat::Pretty`] for TTY, otherwise [`LogFormat::Simplified`].
    Auto,

    /// Pretty printing with colors.
    Pretty,

    /// Simplified plain text output.
    Simplified,

    /// Dump out JSON lines.
    Json,
}

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

/// Logging configuration.
///
/// Logs are always written to stderr; stdout only carries the report.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `BB__LOGGING__LEVEL`
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
    /// `BB__LOGGING__FORMAT`
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

/// Main configuration struct for the benchmark.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Region of the storage service, used to derive the default S3 endpoint.
    ///
    /// # Default
    ///
    /// `us-east-1`
    pub region: String,

    /// Bucket holding the benchmarked objects.
    ///
    /// # Default
    ///
    /// `abk-test-rusoto-download`
    pub bucket: String,

    /// Common prefix of the benchmarked object keys.
    ///
    /// # Default
    ///
    /// `test-object-8388608`
    pub key_prefix: String,

    /// Number of distinct objects cycled through by the samples.
    ///
    /// # Default
    ///
    /// `40`
    pub keyspace_size: u64,

    /// Number of concurrent workers.
    ///
    /// # Default
    ///
    /// `3`
    pub workers: usize,

    /// Number of retrievals per run.
    ///
    /// # Default
    ///
    /// `10`
    pub samples: u64,

    /// Optional sweep over worker counts, starting at [`workers`](Self::workers).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sweep: Option<Sweep>,

    /// Parameters of the `seed` command.
    pub seed: Seed,

    /// Backend holding the objects.
    pub storage: Storage,

    /// Logging configuration.
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_owned(),
            bucket: "abk-test-rusoto-download".to_owned(),
            key_prefix: "test-object-8388608".to_owned(),
            keyspace_size: DEFAULT_KEYSPACE_SIZE,
            workers: 3,
            samples: 10,
            sweep: None,
            seed: Seed::default(),
            storage: Storage::default(),
            logging: Logging::default(),
        }
    }
}

/// Values given on the command line, taking precedence over all other sources.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    /// See [`Config::region`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// See [`Config::bucket`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// See [`Config::key_prefix`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    /// See [`Config::workers`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,
    /// See [`Config::samples`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samples: Option<u64>,
    /// See [`Config::sweep`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<SweepOverrides>,
    /// See [`Seed::object_size`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<SeedOverrides>,
}

/// Command-line overrides of [`Sweep`].
///
/// Each field is merged on its own, so `--sweep-until` keeps a configured step and vice versa.
#[derive(Debug, Default, Serialize)]
pub struct SweepOverrides {
    /// See [`Sweep::until`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<usize>,
    /// See [`Sweep::step`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl SweepOverrides {
    /// Returns `None` if neither field is set.
    pub fn new(until: Option<usize>, step: Option<usize>) -> Option<Self> {
        (until.is_some() || step.is_some()).then_some(Self { until, step })
    }
}

/// Command-line overrides of [`Seed`].
#[derive(Debug, Default, Serialize)]
pub struct SeedOverrides {
    /// See [`Seed::object_size`].
    pub object_size: ByteSize,
}

impl Config {
    /// Loads configuration from the provided arguments.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if provided)
    /// 3. Environment variables (prefixed with `BB__`)
    /// 4. Command-line overrides
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    /// - The resulting configuration fails validation
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(overrides))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            bail!("`workers` must be at least 1");
        }
        if self.samples == 0 {
            bail!("`samples` must be at least 1");
        }
        if self.keyspace_size == 0 {
            bail!("`keyspace_size` must be at least 1");
        }
        if let Some(sweep) = self.sweep {
            if sweep.step == 0 {
                bail!("`sweep.step` must be at least 1");
            }
            if sweep.until < self.workers {
                bail!("`sweep.until` must not be smaller than `workers`");
            }
        }
        Ok(())
    }

    /// Returns the worker counts to run with, in order.
    ///
    /// Without a sweep this is just [`workers`](Self::workers).
    pub fn worker_counts(&self) -> Vec<usize> {
        match self.sweep {
            Some(Sweep { until, step }) => (self.workers..=until).step_by(step.max(1)).collect(),
            None => vec![self.workers],
        }
    }

    /// Returns the parameters of a single run with the given number of workers.
    pub fn benchmark(&self, workers: usize) -> BenchmarkConfig {
        BenchmarkConfig {
            bucket: self.bucket.clone(),
            workers,
            samples: self.samples,
            key_prefix: self.key_prefix.clone(),
            keyspace_size: self.keyspace_size,
        }
    }

    /// Returns the keyspace the samples cycle through.
    pub fn keyspace(&self) -> Keyspace {
        Keyspace::new(self.key_prefix.as_str(), self.keyspace_size)
    }

    /// Returns the endpoint of the S3-compatible service.
    ///
    /// Falls back to the AWS endpoint of [`region`](Self::region) if none is configured.
    pub fn s3_endpoint(&self) -> String {
        match &self.storage {
            Storage::S3Compatible {
                endpoint: Some(endpoint),
                ..
            } => endpoint.clone(),
            _ => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }
}
