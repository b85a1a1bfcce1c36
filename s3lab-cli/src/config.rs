//! Configuration for the `s3lab` tool.
//!
//! Configuration is merged from the following sources, later ones overriding earlier ones:
//!
//! 1. Defaults
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Environment variables (prefixed with `S3LAB__`)
//! 4. Command line flags of the subcommand
//!
//! # Environment Variables
//!
//! Environment variables use `S3LAB__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `S3LAB__STORAGE__ENDPOINT=http://minio:9000` sets the S3 endpoint
//! - `S3LAB__POOL__MAX_CONNECTIONS=50` sets the pool capacity
//! - `S3LAB__LOAD__BUSY_DURATION=250ms` sets how long each fetch holds its connection
//!
//! # YAML Configuration File
//!
//! The above configuration in YAML format would look like this:
//!
//! ```yaml
//! storage:
//!   endpoint: http://minio:9000
//!
//! pool:
//!   max_connections: 50
//!
//! load:
//!   busy_duration: 250ms
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use s3lab_harness::HarnessConfig;
use s3lab_harness::corpus::{DEFAULT_BUCKET, DEFAULT_PREFIX};
use s3lab_service::PoolConfig;
use s3lab_service::backend::S3Config;
use s3lab_service::pool::{
    DEFAULT_CONNECTION_TIMEOUT, DEFAULT_MAX_CONNECTIONS, MAX_CONNECTIONS_LIMIT,
};
use secrecy::{CloneableSecret, ExposeSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "S3LAB__";

/// Upper bound on the number of workers. Each worker gets its own runtime thread.
const MAX_CONCURRENCY: usize = 65_536;

/// Newtype around `String` that may protect against accidental
/// logging of secrets in our configuration struct. Use with
/// [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
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

/// Connection settings of the S3-compatible service and naming of the corpus.
///
/// Used in: [`Config::storage`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Storage {
    /// S3 endpoint URL.
    ///
    /// # Default
    ///
    /// `http://127.0.0.1:9000`, a local MinIO.
    ///
    /// # Environment Variable
    ///
    /// `S3LAB__STORAGE__ENDPOINT`
    pub endpoint: String,

    /// Signing region.
    ///
    /// # Default
    ///
    /// `us-east-1`
    pub region: String,

    /// Access key used to sign requests.
    ///
    /// # Default
    ///
    /// `root`
    pub username: String,

    /// Secret key used to sign requests. Redacted from logs.
    ///
    /// # Default
    ///
    /// `password`
    ///
    /// # Environment Variable
    ///
    /// `S3LAB__STORAGE__PASSWORD`
    pub password: SecretBox<ConfigSecret>,

    /// Bucket holding the seeded objects. Created if it does not exist.
    ///
    /// # Default
    ///
    /// `s3lab-bucket`
    pub bucket: String,

    /// Prefix of the seeded object names, which are followed by the worker index.
    ///
    /// # Default
    ///
    /// `s3lab-file`
    pub prefix: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".to_owned(),
            region: "us-east-1".to_owned(),
            username: "root".to_owned(),
            password: SecretBox::new(Box::new(ConfigSecret::from("password"))),
            bucket: DEFAULT_BUCKET.to_owned(),
            prefix: DEFAULT_PREFIX.to_owned(),
        }
    }
}

/// Connection pool limits of the client.
///
/// Used in: [`Config::pool`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Pool {
    /// Maximum number of connections leased at the same time.
    ///
    /// Requests beyond this limit wait for a connection to be released.
    ///
    /// # Default
    ///
    /// `150`
    ///
    /// # Environment Variable
    ///
    /// `S3LAB__POOL__MAX_CONNECTIONS`
    pub max_connections: usize,

    /// How long a request waits for a pooled connection before failing.
    ///
    /// This also bounds establishing new TCP connections.
    ///
    /// # Default
    ///
    /// `10s`
    #[serde(with = "humantime_serde")]
    pub connection_timeout: Duration,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

/// Shape of the generated load.
///
/// Used in: [`Config::load`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Load {
    /// Number of concurrent workers. Each one is bound to its own object.
    ///
    /// # Default
    ///
    /// `1000`
    pub concurrency: usize,

    /// How long each successful fetch keeps its connection before the body is drained.
    ///
    /// # Default
    ///
    /// `10ms`
    #[serde(with = "humantime_serde")]
    pub busy_duration: Duration,

    /// Delay between the end of one fetch and the start of the worker's next fetch.
    ///
    /// # Default
    ///
    /// `100ms`
    #[serde(with = "humantime_serde")]
    pub idle_duration: Duration,
}

impl Default for Load {
    fn default() -> Self {
        let defaults = HarnessConfig::default();
        Self {
            concurrency: defaults.concurrency,
            busy_duration: defaults.busy_duration,
            idle_duration: defaults.idle_duration,
        }
    }
}

/// Runtime configuration for the Tokio async runtime.
///
/// Used in: [`Config::runtime`]
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Runtime {
    /// Number of worker threads for the runtime.
    ///
    /// # Default
    ///
    /// One thread per worker plus one for the monitor.
    ///
    /// # Environment Variable
    ///
    /// `S3LAB__RUNTIME__WORKER_THREADS`
    pub worker_threads: Option<usize>,

    /// Upper bound for the duration of a run.
    ///
    /// # Default
    ///
    /// `1day`
    #[serde(with = "humantime_serde")]
    pub max_wait: Duration,
}

impl Default for Runtime {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_wait: s3lab_harness::DEFAULT_MAX_WAIT,
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
    ///
    /// ```text
    ///  INFO  s3lab_harness::monitor > 1423 requests handled, current pool={12 pending, 0 available, 150 leased}
    /// ```
    Pretty,

    /// Simplified plain text output.
    ///
    /// ```text
    /// 2020-12-04T12:10:32Z [s3lab_harness::monitor] INFO: 1423 requests handled, current pool={12 pending, 0 available, 150 leased}
    /// ```
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
/// Logs are always written to stderr.
///
/// Used in: [`Config::logging`]
#[derive(Debug, Deserialize, Serialize)]
pub struct Logging {
    /// Minimum log level to output.
    ///
    /// The `RUST_LOG` environment variable provides more granular control per module if needed.
    /// At `DEBUG`, every consumed object is logged.
    ///
    /// # Default
    ///
    /// `INFO`
    ///
    /// # Environment Variable
    ///
    /// `S3LAB__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// Log output format. See [`LogFormat`] for available options.
    ///
    /// # Default
    ///
    /// `Auto` (pretty for TTY, simplified otherwise)
    ///
    /// # Environment Variable
    ///
    /// `S3LAB__LOGGING__FORMAT`
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

/// Main configuration struct for the `s3lab` tool.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    /// Connection settings and corpus naming.
    pub storage: Storage,
    /// Connection pool limits.
    pub pool: Pool,
    /// Shape of the generated load.
    pub load: Load,
    /// Tokio runtime settings.
    pub runtime: Runtime,
    /// Log level and format.
    pub logging: Logging,
}

/// Values given on the command line, applied on top of all other sources.
///
/// Fields left as `None` keep the value from the lower layers.
#[derive(Debug, Default, Serialize)]
pub struct Overrides {
    pub storage: StorageOverrides,
    pub pool: PoolOverrides,
    pub load: LoadOverrides,
}

/// Command line overrides for [`Storage`].
#[derive(Debug, Default, Serialize)]
pub struct StorageOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Command line overrides for [`Pool`].
#[derive(Debug, Default, Serialize)]
pub struct PoolOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    #[serde(
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub connection_timeout: Option<Duration>,
}

/// Command line overrides for [`Load`].
#[derive(Debug, Default, Serialize)]
pub struct LoadOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub busy_duration: Option<Duration>,
    #[serde(
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub idle_duration: Option<Duration>,
}

impl Config {
    /// Loads configuration from all sources and validates it.
    ///
    /// Configuration is merged in the following order (later sources override earlier ones):
    /// 1. Default values
    /// 2. YAML configuration file (if `path` is given)
    /// 3. Environment variables (prefixed with `S3LAB__`)
    /// 4. `overrides` from the command line
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The YAML configuration file cannot be read or parsed
    /// - Environment variables contain invalid values
    /// - The merged configuration fails [`Config::validate`]
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self> {
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

    /// Rejects configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.load.concurrency > 0,
            "load.concurrency must be at least 1"
        );
        anyhow::ensure!(
            self.load.concurrency <= MAX_CONCURRENCY,
            "load.concurrency must be at most {MAX_CONCURRENCY}"
        );
        anyhow::ensure!(
            self.pool.max_connections > 0,
            "pool.max_connections must be at least 1"
        );
        anyhow::ensure!(
            self.pool.max_connections <= MAX_CONNECTIONS_LIMIT,
            "pool.max_connections must be at most {MAX_CONNECTIONS_LIMIT}"
        );
        Ok(())
    }

    /// Returns the number of runtime worker threads to start.
    pub fn worker_threads(&self) -> usize {
        self.runtime
            .worker_threads
            .unwrap_or_else(|| self.load.concurrency.saturating_add(1))
    }

    /// Returns the settings for the S3 transport.
    pub fn s3_config(&self) -> S3Config {
        S3Config {
            endpoint: self.storage.endpoint.clone(),
            region: self.storage.region.clone(),
            access_key: self.storage.username.clone(),
            secret_key: self.storage.password.expose_secret().as_str().to_owned(),
            max_connections: self.pool.max_connections,
            connection_timeout: self.pool.connection_timeout,
        }
    }

    /// Returns the limits of the client's connection pool.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.pool.max_connections,
            connection_timeout: self.pool.connection_timeout,
        }
    }

    /// Returns the settings of the pooling test.
    pub fn harness_config(&self) -> HarnessConfig {
        HarnessConfig {
            bucket: self.storage.bucket.clone(),
            prefix: self.storage.prefix.clone(),
            concurrency: self.load.concurrency,
            busy_duration: self.load.busy_duration,
            idle_duration: self.load.idle_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None, Overrides::default()).unwrap();

            assert_eq!(config.storage.endpoint, "http://127.0.0.1:9000");
            assert_eq!(config.storage.region, "us-east-1");
            assert_eq!(config.storage.username, "root");
            assert_eq!(config.storage.password.expose_secret().as_str(), "password");
            assert_eq!(config.storage.bucket, "s3lab-bucket");
            assert_eq!(config.storage.prefix, "s3lab-file");
            assert_eq!(config.pool.max_connections, 150);
            assert_eq!(config.pool.connection_timeout, Duration::from_secs(10));
            assert_eq!(config.load.concurrency, 1000);
            assert_eq!(config.load.busy_duration, Duration::from_millis(10));
            assert_eq!(config.load.idle_duration, Duration::from_millis(100));
            assert_eq!(config.runtime.max_wait, Duration::from_secs(86400));
            assert_eq!(config.worker_threads(), 1001);
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("S3LAB__STORAGE__ENDPOINT", "http://minio:9000");
            jail.set_env("S3LAB__STORAGE__PASSWORD", "hunter2");
            jail.set_env("S3LAB__POOL__MAX_CONNECTIONS", "50");
            jail.set_env("S3LAB__LOAD__BUSY_DURATION", "250ms");
            jail.set_env("S3LAB__RUNTIME__WORKER_THREADS", "4");
            jail.set_env("S3LAB__LOGGING__LEVEL", "debug");
            jail.set_env("S3LAB__LOGGING__FORMAT", "json");

            let config = Config::load(None, Overrides::default()).unwrap();

            assert_eq!(config.storage.endpoint, "http://minio:9000");
            assert_eq!(config.storage.password.expose_secret().as_str(), "hunter2");
            assert_eq!(config.pool.max_connections, 50);
            assert_eq!(config.load.busy_duration, Duration::from_millis(250));
            assert_eq!(config.worker_threads(), 4);
            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                endpoint: http://minio:9000
                bucket: pooling
            load:
                concurrency: 20
                idle_duration: 1s
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path()), Overrides::default()).unwrap();

            assert_eq!(config.storage.endpoint, "http://minio:9000");
            assert_eq!(config.storage.bucket, "pooling");
            assert_eq!(config.storage.region, "us-east-1");
            assert_eq!(config.load.concurrency, 20);
            assert_eq!(config.load.idle_duration, Duration::from_secs(1));
            assert_eq!(config.load.busy_duration, Duration::from_millis(10));
            assert_eq!(config.worker_threads(), 21);

            Ok(())
        });
    }

    #[test]
    fn flags_override_env_and_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            storage:
                endpoint: http://from-yaml:9000
            pool:
                max_connections: 10
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("S3LAB__STORAGE__ENDPOINT", "http://from-env:9000");
            jail.set_env("S3LAB__POOL__MAX_CONNECTIONS", "20");

            let overrides = Overrides {
                storage: StorageOverrides {
                    endpoint: Some("http://from-flags:9000".to_owned()),
                    ..Default::default()
                },
                pool: PoolOverrides {
                    connection_timeout: Some(Duration::from_millis(500)),
                    ..Default::default()
                },
                ..Default::default()
            };
            let config = Config::load(Some(tempfile.path()), overrides).unwrap();

            assert_eq!(config.storage.endpoint, "http://from-flags:9000");
            // Unset flags keep the lower layers.
            assert_eq!(config.pool.max_connections, 20);
            assert_eq!(config.pool.connection_timeout, Duration::from_millis(500));

            Ok(())
        });
    }

    #[test]
    fn rejects_empty_population() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("S3LAB__LOAD__CONCURRENCY", "0");
            assert!(Config::load(None, Overrides::default()).is_err());

            jail.set_env("S3LAB__LOAD__CONCURRENCY", "1");
            jail.set_env("S3LAB__POOL__MAX_CONNECTIONS", "0");
            assert!(Config::load(None, Overrides::default()).is_err());

            Ok(())
        });
    }

    #[test]
    fn rejects_oversized_limits() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("S3LAB__POOL__MAX_CONNECTIONS", usize::MAX.to_string());
            let error = Config::load(None, Overrides::default()).unwrap_err();
            assert!(error.to_string().contains("pool.max_connections"), "{error}");

            jail.set_env("S3LAB__POOL__MAX_CONNECTIONS", MAX_CONNECTIONS_LIMIT.to_string());
            assert!(Config::load(None, Overrides::default()).is_ok());

            let overrides = Overrides {
                load: LoadOverrides {
                    concurrency: Some(MAX_CONCURRENCY + 1),
                    ..Default::default()
                },
                ..Default::default()
            };
            let error = Config::load(None, overrides).unwrap_err();
            assert!(error.to_string().contains("load.concurrency"), "{error}");

            Ok(())
        });
    }

    #[test]
    fn password_is_redacted() {
        let config = Config::default();
        let debug = format!("{:?}", config.storage);
        assert!(!debug.contains("\"password\""), "{debug}");

        let debug = format!("{:?}", config.s3_config());
        assert!(!debug.contains("\"password\""), "{debug}");
    }
}
