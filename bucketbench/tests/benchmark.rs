use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bucketbench::{Benchmark, BenchmarkConfig, Error, Sample};
use bucketbench_backend::{
    Backend, BackendError, BackendResult, GetResponse, InMemoryBackend, PayloadStream,
};
use bytes::Bytes;
use futures_util::StreamExt;

const OBJECT_SIZE: usize = 1000;

/// Wraps an [`InMemoryBackend`], recording requested keys and concurrent retrievals.
///
/// A retrieval is in flight from the request until its body stream is dropped.
#[derive(Debug, Default)]
struct TrackingBackend {
    inner: InMemoryBackend,
    delay: Duration,
    fail_after: Option<usize>,
    requested: Mutex<Vec<String>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: AtomicUsize,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl TrackingBackend {
    fn seeded(prefix: &str, count: u64) -> Self {
        let inner = InMemoryBackend::new();
        for n in 0..count {
            inner.insert("bucket", &format!("{prefix}-{n}"), vec![7u8; OBJECT_SIZE]);
        }
        Self {
            inner,
            ..Default::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for TrackingBackend {
    fn name(&self) -> &'static str {
        "tracking"
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse> {
        let calls = {
            let mut requested = self.requested.lock().unwrap();
            requested.push(key.to_owned());
            requested.len()
        };

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let guard = InFlight(Arc::clone(&self.in_flight));
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;

        if self.fail_after.is_some_and(|limit| calls > limit) {
            return Err(BackendError::Io(std::io::Error::other("connection reset")));
        }
        let response = self.inner.get_object(bucket, key).await?;
        Ok(GetResponse {
            content_length: response.content_length,
            stream: response
                .stream
                .map(move |chunk| {
                    let _held = &guard;
                    chunk
                })
                .boxed(),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_length: u64,
        stream: PayloadStream,
    ) -> BackendResult<()> {
        self.inner
            .put_object(bucket, key, content_length, stream)
            .await
    }
}

/// Serves `body` for every key while declaring `declared` bytes.
#[derive(Debug)]
struct MisdeclaringBackend {
    declared: u64,
    body: &'static [u8],
}

#[async_trait]
impl Backend for MisdeclaringBackend {
    fn name(&self) -> &'static str {
        "misdeclaring"
    }

    async fn get_object(&self, _bucket: &str, _key: &str) -> BackendResult<GetResponse> {
        let chunk: std::io::Result<Bytes> = Ok(Bytes::from_static(self.body));
        Ok(GetResponse {
            content_length: self.declared,
            stream: futures_util::stream::iter([chunk]).boxed(),
        })
    }

    async fn put_object(
        &self,
        _bucket: &str,
        _key: &str,
        _content_length: u64,
        _stream: PayloadStream,
    ) -> BackendResult<()> {
        Ok(())
    }
}

fn config(workers: usize, samples: u64) -> BenchmarkConfig {
    BenchmarkConfig {
        bucket: "bucket".to_owned(),
        workers,
        samples,
        key_prefix: "obj".to_owned(),
        keyspace_size: 40,
    }
}

#[tokio::test]
async fn fetches_every_sample_exactly_once() {
    let backend = Arc::new(TrackingBackend::seeded("obj", 40));

    let report = Benchmark::new(config(4, 25), backend.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let mut requested = backend.requested();
    requested.sort();
    let mut expected: Vec<_> = (1..=25).map(|n| format!("obj-{n}")).collect();
    expected.sort();
    assert_eq!(requested, expected);

    assert_eq!(report.total_bytes, 25 * OBJECT_SIZE as u64);
    assert!(report.avg_last_byte_ms >= report.avg_first_byte_ms);
}

#[tokio::test]
async fn samples_wrap_around_forty_keys() {
    let backend = Arc::new(TrackingBackend::seeded("obj", 40));

    Benchmark::new(config(2, 45), backend.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let requested = backend.requested();
    assert_eq!(requested.len(), 45);
    assert_eq!(requested.iter().filter(|key| *key == "obj-0").count(), 1);
    assert_eq!(requested.iter().filter(|key| *key == "obj-1").count(), 2);
    assert_eq!(requested.iter().filter(|key| *key == "obj-5").count(), 2);
    assert_eq!(requested.iter().filter(|key| *key == "obj-6").count(), 1);
}

#[tokio::test]
async fn single_worker_fetches_sequentially() {
    let backend =
        Arc::new(TrackingBackend::seeded("obj", 40).with_delay(Duration::from_millis(5)));

    let report = Benchmark::new(config(1, 8), backend.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(report.total_bytes, 8 * OBJECT_SIZE as u64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded_by_workers() {
    let backend =
        Arc::new(TrackingBackend::seeded("obj", 40).with_delay(Duration::from_millis(20)));

    Benchmark::new(config(3, 30), backend.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(backend.max_in_flight.load(Ordering::SeqCst), 3);
    assert_eq!(backend.in_flight.load(Ordering::SeqCst), 0);
    assert_eq!(backend.requested().len(), 30);
}

#[tokio::test]
async fn more_workers_than_samples() {
    let backend = Arc::new(TrackingBackend::seeded("obj", 40));

    let report = Benchmark::new(config(16, 3), backend.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(backend.requested().len(), 3);
    assert_eq!(report.total_bytes, 3 * OBJECT_SIZE as u64);
}

#[tokio::test]
async fn first_failure_aborts_the_run() {
    let backend = Arc::new(TrackingBackend::seeded("obj", 40).failing_after(3));

    let err = Benchmark::new(config(2, 20), backend)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Retrieval {
            cause: BackendError::Io(_),
            ..
        }
    ));
}

#[tokio::test]
async fn missing_object_aborts_the_run() {
    let backend = Arc::new(TrackingBackend::seeded("obj", 2));

    let err = Benchmark::new(config(2, 5), backend)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Retrieval {
            cause: BackendError::NotFound { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn short_body_is_a_stream_error() {
    let backend = Arc::new(MisdeclaringBackend {
        declared: 6,
        body: b"short",
    });
    let err = Benchmark::new(config(1, 1), backend)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    let Error::StreamRead { key, cause } = err else {
        panic!("expected a stream error");
    };
    assert_eq!(key, "obj-1");
    assert_eq!(cause.kind(), std::io::ErrorKind::UnexpectedEof);
}

#[tokio::test]
async fn long_body_is_a_stream_error() {
    let backend = Arc::new(MisdeclaringBackend {
        declared: 3,
        body: b"too long",
    });
    let err = Benchmark::new(config(1, 1), backend)
        .unwrap()
        .run()
        .await
        .unwrap_err();

    let Error::StreamRead { key, cause } = err else {
        panic!("expected a stream error");
    };
    assert_eq!(key, "obj-1");
    assert_eq!(cause.kind(), std::io::ErrorKind::InvalidData);
}

#[tokio::test]
async fn samples_cycle_through_the_configured_keyspace() {
    let backend = Arc::new(TrackingBackend::seeded("blob", 4));
    let config = BenchmarkConfig {
        key_prefix: "blob".to_owned(),
        keyspace_size: 4,
        ..config(2, 8)
    };

    Benchmark::new(config, backend.clone())
        .unwrap()
        .run()
        .await
        .unwrap();

    let mut requested = backend.requested();
    requested.sort();
    requested.dedup();
    assert_eq!(requested, ["blob-0", "blob-1", "blob-2", "blob-3"]);
}

#[tokio::test]
async fn custom_key_scheme() {
    let backend = Arc::new(TrackingBackend::seeded("fixed", 2));

    Benchmark::new(config(2, 6), backend.clone())
        .unwrap()
        .with_key_scheme(|sample: Sample| format!("fixed-{}", sample.index() % 2))
        .run()
        .await
        .unwrap();

    let requested = backend.requested();
    assert_eq!(requested.len(), 6);
    assert!(requested.iter().all(|key| key.starts_with("fixed-")));
}

#[tokio::test]
async fn rejects_empty_runs() {
    let backend = Arc::new(InMemoryBackend::new());

    let err = Benchmark::new(config(0, 10), backend.clone()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let err = Benchmark::new(config(3, 0), backend.clone()).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));

    let empty_keyspace = BenchmarkConfig {
        keyspace_size: 0,
        ..config(3, 10)
    };
    let err = Benchmark::new(empty_keyspace, backend).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[tokio::test]
async fn runs_are_repeatable() {
    let backend = Arc::new(TrackingBackend::seeded("obj", 40));
    let benchmark = Benchmark::new(config(3, 10), backend.clone()).unwrap();

    let first = benchmark.run().await.unwrap();
    let second = benchmark.run().await.unwrap();

    assert_eq!(first.total_bytes, second.total_bytes);
    assert_eq!(backend.requested().len(), 20);
}
