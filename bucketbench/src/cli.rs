//! Command-line interface of the `bucketbench` binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;
use bucketbench_backend::{LocalFs, S3Compatible, SharedBackend};
use bytesize::ByteSize;
use secrecy::ExposeSecret;

use crate::benchmark::Benchmark;
use crate::config::{Config, Overrides, SeedOverrides, Storage, SweepOverrides};
use crate::report::HEADER;
use crate::{observability, seed};

/// Measure download throughput and latency of an object store.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    /// region of the storage service
    #[argh(option)]
    pub region: Option<String>,

    /// bucket holding the objects
    #[argh(option)]
    pub bucket: Option<String>,

    /// common prefix of the object keys
    #[argh(option)]
    pub key_prefix: Option<String>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Seed(SeedCommand),
    Version(VersionCommand),
}

/// run the download benchmark and print a report line per worker count
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {
    /// number of concurrent workers
    #[argh(option, short = 'w')]
    workers: Option<usize>,

    /// number of downloads per run
    #[argh(option, short = 'n')]
    samples: Option<u64>,

    /// repeat the run with growing worker counts up to this value
    #[argh(option)]
    sweep_until: Option<usize>,

    /// increment of the worker count between sweep runs (default 5)
    #[argh(option)]
    sweep_step: Option<usize>,
}

/// upload the objects that the benchmark downloads
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "seed")]
struct SeedCommand {
    /// size of every uploaded object, e.g. "8 MiB"
    #[argh(option)]
    object_size: Option<ByteSize>,
}

/// print the version of this tool
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

impl Args {
    fn overrides(&self) -> Overrides {
        let mut overrides = Overrides {
            region: self.region.clone(),
            bucket: self.bucket.clone(),
            key_prefix: self.key_prefix.clone(),
            ..Default::default()
        };

        match &self.command {
            Command::Run(run) => {
                overrides.workers = run.workers;
                overrides.samples = run.samples;
                overrides.sweep = SweepOverrides::new(run.sweep_until, run.sweep_step);
            }
            Command::Seed(seed) => {
                overrides.seed = seed
                    .object_size
                    .map(|object_size| SeedOverrides { object_size });
            }
            Command::Version(_) => {}
        }

        overrides
    }
}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref(), &args.overrides())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("bench-rt")
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config.logging);
    tracing::debug!(?config);

    runtime.block_on(async move {
        match args.command {
            Command::Run(_) => run_benchmarks(&config).await,
            Command::Seed(_) => seed_objects(&config).await,
            Command::Version(_) => Ok(()),
        }
    })
}

fn backend(config: &Config) -> Result<SharedBackend> {
    let backend: SharedBackend = match &config.storage {
        Storage::S3Compatible { token, .. } => {
            let mut backend = S3Compatible::new(&config.s3_endpoint())?;
            if let Some(token) = token {
                backend = backend.with_token(token.expose_secret().as_str());
            }
            Arc::new(backend)
        }
        Storage::FileSystem { path } => Arc::new(LocalFs::new(path)),
    };
    Ok(backend)
}

async fn run_benchmarks(config: &Config) -> Result<()> {
    let backend = backend(config)?;

    let mut printed_header = false;
    for workers in config.worker_counts() {
        let benchmark = Benchmark::new(config.benchmark(workers), Arc::clone(&backend))?;

        let report = benchmark.run().await?;
        if !printed_header {
            println!("{HEADER}");
            printed_header = true;
        }
        println!("{report}");
    }

    Ok(())
}

async fn seed_objects(config: &Config) -> Result<()> {
    let backend = backend(config)?;
    let written = seed::seed_keyspace(
        backend.as_ref(),
        &config.bucket,
        &config.keyspace(),
        config.seed.object_size.as_u64(),
        config.seed.concurrency,
    )
    .await?;

    tracing::info!(written = %ByteSize::b(written), "seeding finished");
    Ok(())
}
