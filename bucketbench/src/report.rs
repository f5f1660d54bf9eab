//! Rendering of run totals into the summary line.

use std::fmt;
use std::time::Duration;

use crate::aggregate::Totals;

/// Column names of [`Report`] lines, printed once before the first line.
pub const HEADER: &str = "Total time, Total bytes, Throughput, Avg first byte, Avg last byte";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const NANOS_PER_MS: f64 = 1_000_000.0;

/// Throughput and average latencies of a finished run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Report {
    /// Wall-clock duration of the run.
    pub total_elapsed: Duration,
    /// Bytes transferred over all samples.
    pub total_bytes: u64,
    /// Aggregate throughput in MiB per second.
    pub throughput_mbps: f64,
    /// Mean first-byte latency in milliseconds.
    pub avg_first_byte_ms: f64,
    /// Mean last-byte latency in milliseconds.
    pub avg_last_byte_ms: f64,
}

impl Report {
    /// Derives the report from the sums of a run.
    pub fn from_totals(totals: &Totals) -> Self {
        let elapsed_secs = totals.elapsed.as_secs_f64();
        let throughput_mbps = if elapsed_secs > 0.0 {
            totals.total_bytes as f64 / elapsed_secs / BYTES_PER_MB
        } else {
            0.0
        };

        Self {
            total_elapsed: totals.elapsed,
            total_bytes: totals.total_bytes,
            throughput_mbps,
            avg_first_byte_ms: average_ms(totals.sum_first_byte, totals.samples),
            avg_last_byte_ms: average_ms(totals.sum_last_byte, totals.samples),
        }
    }
}

fn average_ms(sum: Duration, samples: u64) -> f64 {
    if samples == 0 {
        return 0.0;
    }
    sum.as_nanos() as f64 / samples as f64 / NANOS_PER_MS
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:9.4} s, {} B, {:6.1} MB/s, {:5.0} ms, {:5.0} ms",
            self.total_elapsed.as_secs_f64(),
            self.total_bytes,
            self.throughput_mbps,
            self.avg_first_byte_ms,
            self.avg_last_byte_ms,
        )
    }
}
