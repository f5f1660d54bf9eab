//! Timed retrieval of objects by the worker pool.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use bucketbench_backend::{GetResponse, SharedBackend};
use flume::{Receiver, Sender};
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::io::StreamReader;

use crate::error::{Error, Result};
use crate::keyspace::{KeyScheme, Sample};

/// Size of the buffer that object bodies are drained through.
pub const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Timing of a single, fully read object.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Measurement {
    /// Number of body bytes read. Always equals the declared content length.
    pub bytes_read: u64,
    /// Time from sending the request until the response headers were received.
    pub first_byte: Duration,
    /// Time from sending the request until the body was fully read.
    pub last_byte: Duration,
}

/// One member of the worker pool.
///
/// A worker pulls samples until the task queue is closed and drained, and pushes exactly
/// one result per sample. After pushing an error it stops.
pub(crate) struct Worker {
    pub id: usize,
    pub backend: SharedBackend,
    pub bucket: Arc<str>,
    pub keys: Arc<dyn KeyScheme>,
    pub tasks: Receiver<Sample>,
    pub results: Sender<Result<Measurement>>,
}

impl Worker {
    pub async fn run(self) {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];

        while let Ok(sample) = self.tasks.recv_async().await {
            let result = self.measure(sample, &mut buf).await;
            let fatal = result.is_err();

            if self.results.send_async(result).await.is_err() || fatal {
                break;
            }
        }

        tracing::trace!(worker = self.id, "worker finished");
    }

    #[tracing::instrument(level = "debug", skip_all, fields(worker = self.id, %sample))]
    async fn measure(&self, sample: Sample, buf: &mut [u8]) -> Result<Measurement> {
        let key = self.keys.key_for(sample);

        let start = Instant::now();
        let GetResponse {
            content_length,
            stream,
        } = self
            .backend
            .get_object(&self.bucket, &key)
            .await
            .map_err(|cause| Error::Retrieval {
                key: key.clone(),
                cause,
            })?;
        let first_byte = start.elapsed();
        tracing::trace!(%key, content_length, ?first_byte, "received response headers");

        let mut reader = StreamReader::new(stream);
        let mut bytes_read = 0u64;
        loop {
            let read = reader
                .read(buf)
                .await
                .map_err(|cause| Error::StreamRead {
                    key: key.clone(),
                    cause,
                })?;
            if read == 0 {
                break;
            }
            bytes_read += read as u64;
        }
        drop(reader);
        let last_byte = start.elapsed();

        if bytes_read != content_length {
            let kind = if bytes_read < content_length {
                io::ErrorKind::UnexpectedEof
            } else {
                io::ErrorKind::InvalidData
            };
            return Err(Error::StreamRead {
                key,
                cause: io::Error::new(
                    kind,
                    format!("declared {content_length} bytes but read {bytes_read}"),
                ),
            });
        }

        tracing::debug!(%key, bytes_read, ?first_byte, ?last_byte, "object retrieved");
        Ok(Measurement {
            bytes_read,
            first_byte,
            last_byte,
        })
    }
}

#[cfg(test)]
mod tests {
    use bucketbench_backend::{BackendError, InMemoryBackend};

    use super::*;
    use crate::keyspace::Keyspace;

    fn worker(backend: InMemoryBackend) -> (Worker, Sender<Sample>, Receiver<Result<Measurement>>) {
        let (task_tx, task_rx) = flume::bounded(4);
        let (result_tx, result_rx) = flume::bounded(16);
        let worker = Worker {
            id: 0,
            backend: Arc::new(backend),
            bucket: Arc::from("bucket"),
            keys: Arc::new(Keyspace::new("obj", 4)),
            tasks: task_rx,
            results: result_tx,
        };
        (worker, task_tx, result_rx)
    }

    #[tokio::test]
    async fn measures_full_objects() {
        let backend = InMemoryBackend::new();
        backend.insert("bucket", "obj-1", vec![0u8; 3 * READ_BUFFER_SIZE + 17]);
        let (worker, _tasks, _results) = worker(backend);

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let measurement = worker.measure(Sample::new(5), &mut buf).await.unwrap();

        assert_eq!(measurement.bytes_read, (3 * READ_BUFFER_SIZE + 17) as u64);
        assert!(measurement.last_byte >= measurement.first_byte);
    }

    #[tokio::test]
    async fn missing_object_is_a_retrieval_error() {
        let (worker, _tasks, _results) = worker(InMemoryBackend::new());

        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        let err = worker.measure(Sample::new(2), &mut buf).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Retrieval { ref key, cause: BackendError::NotFound { .. } } if key == "obj-2"
        ));
    }

    #[tokio::test]
    async fn emits_one_result_per_sample_until_closed() {
        let backend = InMemoryBackend::new();
        for n in 0..4 {
            backend.insert("bucket", &format!("obj-{n}"), vec![1u8; 10]);
        }
        let (worker, tasks, results) = worker(backend);
        let handle = tokio::spawn(worker.run());

        for index in 1..=4 {
            tasks.send_async(Sample::new(index)).await.unwrap();
        }
        drop(tasks);
        handle.await.unwrap();

        let collected: Vec<_> = results.drain().collect();
        assert_eq!(collected.len(), 4);
        assert!(collected.iter().all(|r| matches!(r, Ok(m) if m.bytes_read == 10)));
    }

    #[tokio::test]
    async fn stops_after_the_first_failure() {
        let backend = InMemoryBackend::new();
        backend.insert("bucket", "obj-2", vec![1u8; 10]);
        let (worker, tasks, results) = worker(backend);

        // obj-1 is missing
        tasks.send_async(Sample::new(1)).await.unwrap();
        tasks.send_async(Sample::new(2)).await.unwrap();
        worker.run().await;

        let collected: Vec<_> = results.drain().collect();
        assert_eq!(collected.len(), 1);
        assert!(matches!(collected[0], Err(Error::Retrieval { .. })));
        assert_eq!(tasks.len(), 1);
    }
}
