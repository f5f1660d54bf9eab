//! Run a download benchmark with a fixed pool of workers and report the results.

use std::sync::Arc;

use bucketbench_backend::SharedBackend;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::aggregate::ResultAggregator;
use crate::dispatch;
use crate::error::{Error, Result};
use crate::keyspace::{KeyScheme, Keyspace};
use crate::report::Report;
use crate::worker::Worker;

/// Parameters of a single benchmark run.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BenchmarkConfig {
    /// The bucket holding the benchmarked objects.
    pub bucket: String,
    /// Number of concurrent workers, and capacity of the task queue.
    pub workers: usize,
    /// Total number of retrievals.
    pub samples: u64,
    /// Common prefix of the fetched keys.
    pub key_prefix: String,
    /// Number of distinct keys that samples cycle through.
    pub keyspace_size: u64,
}

/// A configured download benchmark.
///
/// Each call to [`run`](Self::run) performs `samples` retrievals spread over `workers`
/// concurrent workers, and sums up their timings into a [`Report`].
pub struct Benchmark {
    config: BenchmarkConfig,
    backend: SharedBackend,
    keys: Arc<dyn KeyScheme>,
}

impl Benchmark {
    /// Creates a benchmark that fetches `key_prefix-<i mod keyspace_size>` for sample `i`.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::InvalidConfig`] if there are no workers, no samples or no keys.
    pub fn new(config: BenchmarkConfig, backend: SharedBackend) -> Result<Self> {
        if config.workers == 0 {
            return Err(Error::InvalidConfig("at least one worker is required"));
        }
        if config.samples == 0 {
            return Err(Error::InvalidConfig("at least one sample is required"));
        }
        if config.keyspace_size == 0 {
            return Err(Error::InvalidConfig("at least one key is required"));
        }

        let keys = Keyspace::new(config.key_prefix.as_str(), config.keyspace_size);
        Ok(Self {
            config,
            backend,
            keys: Arc::new(keys),
        })
    }

    /// Replaces the mapping from samples to keys.
    ///
    /// The configured key prefix and keyspace size no longer apply afterwards.
    pub fn with_key_scheme(mut self, keys: impl KeyScheme) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// The parameters of this benchmark.
    pub fn config(&self) -> &BenchmarkConfig {
        &self.config
    }

    /// Runs the benchmark to completion.
    ///
    /// # Errors
    ///
    /// Returns the first retrieval or stream error of any worker. Remaining workers are
    /// aborted without waiting for their in-flight requests, and no report is produced.
    pub async fn run(&self) -> Result<Report> {
        let BenchmarkConfig {
            ref bucket,
            workers,
            samples,
            ..
        } = self.config;

        tracing::info!(
            backend = self.backend.name(),
            %bucket,
            workers,
            samples,
            "starting benchmark"
        );

        let (dispatcher, tasks) = dispatch::task_queue(workers);
        // Holds one slot per sample, so workers never wait on the aggregator.
        let capacity = usize::try_from(samples)
            .map_err(|_| Error::InvalidConfig("sample count exceeds the address space"))?;
        let (results_tx, results_rx) = flume::bounded(capacity);

        let bucket: Arc<str> = Arc::from(bucket.as_str());
        let mut set = JoinSet::new();
        for id in 0..workers {
            let worker = Worker {
                id,
                backend: Arc::clone(&self.backend),
                bucket: Arc::clone(&bucket),
                keys: Arc::clone(&self.keys),
                tasks: tasks.clone(),
                results: results_tx.clone(),
            };
            set.spawn(worker.run());
        }
        drop(tasks);
        drop(results_tx);

        let start = Instant::now();
        set.spawn(async move {
            dispatcher.submit(samples).await;
        });

        // On error, dropping `set` aborts the dispatcher and all workers.
        let totals = ResultAggregator::new(results_rx)
            .collect(samples, start)
            .await?;

        while let Some(joined) = set.join_next().await {
            joined?;
        }

        let report = Report::from_totals(&totals);
        tracing::info!(
            elapsed = ?report.total_elapsed,
            total_bytes = report.total_bytes,
            "benchmark finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Benchmark")
            .field("config", &self.config)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
