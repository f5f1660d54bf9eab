use bucketbench_backend::BackendError;
use thiserror::Error;

/// Errors that abort a benchmark run.
///
/// None of these are recovered: the first one surfaces from
/// [`Benchmark::run`](crate::Benchmark::run) and no report is produced.
#[derive(Debug, Error)]
pub enum Error {
    /// The request for an object failed before any body was read.
    #[error("failed to retrieve object `{key}`")]
    Retrieval {
        /// The key that was requested.
        key: String,
        /// The backend failure.
        #[source]
        cause: BackendError,
    },

    /// Draining the body of an object failed, or it did not match its declared length.
    #[error("failed to read body of object `{key}`")]
    StreamRead {
        /// The key whose body was being read.
        key: String,
        /// The read failure.
        #[source]
        cause: std::io::Error,
    },

    /// Uploading a keyspace object failed.
    #[error("failed to seed object `{key}`")]
    Seed {
        /// The key that was being written.
        key: String,
        /// The backend failure.
        #[source]
        cause: BackendError,
    },

    /// The benchmark parameters cannot produce a run.
    #[error("invalid benchmark configuration: {0}")]
    InvalidConfig(&'static str),

    /// All workers exited before every sample produced a measurement.
    #[error("workers stopped after {received} of {expected} measurements")]
    Incomplete {
        /// The number of samples submitted.
        expected: u64,
        /// The number of measurements received.
        received: u64,
    },

    /// A harness task panicked or was cancelled.
    #[error("benchmark task failed")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type for benchmark operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
