use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use argh::FromArgs;

use crate::config::{Config, LoadOverrides, Overrides, PoolOverrides, StorageOverrides};
use crate::{observability, pooling};

/// Connection pool load tester for S3-compatible object stores.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    TestPooling(TestPoolingCommand),
    Version(VersionCommand),
}

/// tests connection pooling behavior with lots of getObject calls
///
/// Seeds one object per worker, then lets every worker fetch its object on a fixed delay while
/// holding the connection for the busy duration. Pool occupancy is logged once per second. The
/// first failed request stops the run.
#[derive(Debug, Default, FromArgs)]
#[argh(subcommand, name = "testPooling")]
struct TestPoolingCommand {
    /// endpoint URL of the S3-compatible service (default: http://127.0.0.1:9000)
    #[argh(option)]
    endpoint: Option<String>,

    /// signing region (default: us-east-1)
    #[argh(option)]
    region: Option<String>,

    /// access key (default: root)
    #[argh(option)]
    username: Option<String>,

    /// secret key (default: password)
    #[argh(option)]
    password: Option<String>,

    /// maximum number of simultaneous connections (default: 150)
    #[argh(option)]
    max_connections: Option<usize>,

    /// milliseconds to wait for a pooled connection (default: 10000)
    #[argh(option)]
    connection_timeout: Option<u64>,

    /// number of concurrent workers (default: 1000)
    #[argh(option)]
    concurrency: Option<usize>,

    /// milliseconds each fetch holds its connection (default: 10)
    #[argh(option)]
    busy_duration: Option<u64>,

    /// milliseconds between two fetches of a worker (default: 100)
    #[argh(option)]
    idle_duration: Option<u64>,
}

impl TestPoolingCommand {
    fn into_overrides(self) -> Overrides {
        Overrides {
            storage: StorageOverrides {
                endpoint: self.endpoint,
                region: self.region,
                username: self.username,
                password: self.password,
            },
            pool: PoolOverrides {
                max_connections: self.max_connections,
                connection_timeout: self.connection_timeout.map(Duration::from_millis),
            },
            load: LoadOverrides {
                concurrency: self.concurrency,
                busy_duration: self.busy_duration.map(Duration::from_millis),
                idle_duration: self.idle_duration.map(Duration::from_millis),
            },
        }
    }
}

/// print the s3lab version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    let command = match args.command {
        // Special switch to just print the version and exit.
        Command::Version(VersionCommand {}) => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::TestPooling(command) => command,
    };

    let config = Config::load(args.config.as_deref(), command.into_overrides())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("main-rt")
        .enable_all()
        .worker_threads(config.worker_threads())
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    runtime.block_on(pooling::run(config))
}
