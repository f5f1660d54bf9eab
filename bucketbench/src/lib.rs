//! Download benchmark for object stores.
//!
//! A [`Benchmark`] fetches a fixed number of objects through a pool of concurrent workers and
//! sums up their timings into a [`Report`]:
//!
//! - the [`dispatch`] module feeds sample indices into a bounded task queue,
//! - [`worker`]s fetch the object of each sample and time the first and last byte,
//! - the [`aggregate`] module collects the measurements into run totals,
//! - the [`report`] module renders the totals as a single summary line.
//!
//! Objects are read through a [`bucketbench_backend::Backend`], and the [`seed`] module writes
//! the keyspace that runs draw from.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod aggregate;
pub mod benchmark;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keyspace;
pub mod observability;
pub mod report;
pub mod seed;
pub mod worker;

pub use aggregate::{ResultAggregator, Totals};
pub use benchmark::{Benchmark, BenchmarkConfig};
pub use error::{Error, Result};
pub use keyspace::{KeyScheme, Keyspace, Sample};
pub use report::{HEADER, Report};
pub use worker::Measurement;
