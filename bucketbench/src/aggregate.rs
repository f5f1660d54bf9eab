//! Collection of worker measurements into run totals.

use std::time::Duration;

use flume::Receiver;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::worker::Measurement;

/// Sums over all measurements of a run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Totals {
    /// Number of measurements added.
    pub samples: u64,
    /// Sum of bytes read.
    pub total_bytes: u64,
    /// Sum of first-byte latencies.
    pub sum_first_byte: Duration,
    /// Sum of last-byte latencies.
    pub sum_last_byte: Duration,
    /// Wall-clock time from dispatch start until the last measurement arrived.
    pub elapsed: Duration,
}

impl Totals {
    /// Adds a single measurement to the sums.
    pub fn add(&mut self, measurement: &Measurement) {
        self.samples += 1;
        self.total_bytes += measurement.bytes_read;
        self.sum_first_byte += measurement.first_byte;
        self.sum_last_byte += measurement.last_byte;
    }
}

/// Receives worker results until every submitted sample is accounted for.
#[derive(Debug)]
pub struct ResultAggregator {
    results: Receiver<Result<Measurement>>,
}

impl ResultAggregator {
    /// Creates an aggregator reading from the result queue.
    pub fn new(results: Receiver<Result<Measurement>>) -> Self {
        Self { results }
    }

    /// Collects exactly `sample_count` measurements.
    ///
    /// `start` marks the beginning of dispatch; the elapsed time is taken when the last
    /// measurement arrives. The first error received is returned as is. If the queue closes
    /// early, fails with [`Error::Incomplete`].
    pub async fn collect(self, sample_count: u64, start: Instant) -> Result<Totals> {
        let mut totals = Totals::default();

        while totals.samples < sample_count {
            match self.results.recv_async().await {
                Ok(Ok(measurement)) => totals.add(&measurement),
                Ok(Err(error)) => return Err(error),
                Err(_) => {
                    return Err(Error::Incomplete {
                        expected: sample_count,
                        received: totals.samples,
                    });
                }
            }
        }

        totals.elapsed = start.elapsed();
        Ok(totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(bytes_read: u64, first_ms: u64, last_ms: u64) -> Measurement {
        Measurement {
            bytes_read,
            first_byte: Duration::from_millis(first_ms),
            last_byte: Duration::from_millis(last_ms),
        }
    }

    #[test]
    fn sums_are_order_independent() {
        let measurements = [
            measurement(10, 100, 300),
            measurement(20, 200, 250),
            measurement(30, 50, 60),
        ];

        let mut forward = Totals::default();
        measurements.iter().for_each(|m| forward.add(m));
        let mut backward = Totals::default();
        measurements.iter().rev().for_each(|m| backward.add(m));

        assert_eq!(forward, backward);
        assert_eq!(forward.samples, 3);
        assert_eq!(forward.total_bytes, 60);
        assert_eq!(forward.sum_first_byte, Duration::from_millis(350));
        assert_eq!(forward.sum_last_byte, Duration::from_millis(610));
    }

    #[tokio::test]
    async fn stops_after_exactly_the_sample_count() {
        let (tx, rx) = flume::bounded(8);
        for _ in 0..5 {
            tx.send(Ok(measurement(4, 1, 2))).unwrap();
        }

        let totals = ResultAggregator::new(rx.clone())
            .collect(3, Instant::now())
            .await
            .unwrap();

        assert_eq!(totals.samples, 3);
        assert_eq!(totals.total_bytes, 12);
        assert_eq!(rx.len(), 2);
    }

    #[tokio::test]
    async fn returns_the_first_error() {
        let (tx, rx) = flume::bounded(8);
        tx.send(Ok(measurement(4, 1, 2))).unwrap();
        tx.send(Err(Error::InvalidConfig("boom"))).unwrap();
        tx.send(Ok(measurement(4, 1, 2))).unwrap();

        let err = ResultAggregator::new(rx)
            .collect(3, Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig("boom")));
    }

    #[tokio::test]
    async fn closed_queue_is_incomplete() {
        let (tx, rx) = flume::bounded(8);
        tx.send(Ok(measurement(4, 1, 2))).unwrap();
        drop(tx);

        let err = ResultAggregator::new(rx)
            .collect(2, Instant::now())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Incomplete {
                expected: 2,
                received: 1
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_spans_until_the_last_measurement() {
        let (tx, rx) = flume::bounded(8);
        let start = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send_async(Ok(measurement(1, 1, 1))).await.unwrap();
            tokio::time::sleep(Duration::from_secs(1)).await;
            tx.send_async(Ok(measurement(1, 1, 1))).await.unwrap();
        });

        let totals = ResultAggregator::new(rx).collect(2, start).await.unwrap();
        assert_eq!(totals.elapsed, Duration::from_secs(2));
    }
}
