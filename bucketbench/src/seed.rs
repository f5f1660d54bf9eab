//! Upload of the objects that benchmarks fetch.

use std::pin::Pin;
use std::{io, task};

use bucketbench_backend::Backend;
use futures_util::{StreamExt, TryStreamExt};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tokio::io::{AsyncRead, ReadBuf};
use tokio_util::io::ReaderStream;

use crate::error::{Error, Result};
use crate::keyspace::Keyspace;

/// Writes every key of `keyspace` into `bucket`, each holding `object_size` bytes.
///
/// At most `concurrency` uploads are in flight at a time. Returns the number of bytes
/// written.
///
/// # Errors
///
/// Fails with [`Error::Seed`] on the first failed upload.
pub async fn seed_keyspace(
    backend: &dyn Backend,
    bucket: &str,
    keyspace: &Keyspace,
    object_size: u64,
    concurrency: usize,
) -> Result<u64> {
    tracing::info!(
        backend = backend.name(),
        bucket,
        objects = keyspace.size(),
        object_size,
        "seeding keyspace"
    );

    futures_util::stream::iter(keyspace.keys().map(Ok::<_, Error>))
        .try_for_each_concurrent(concurrency.max(1), |(n, key)| async move {
            let stream = ReaderStream::new(Payload::new(object_size, n)).boxed();
            backend
                .put_object(bucket, &key, object_size, stream)
                .await
                .map_err(|cause| Error::Seed {
                    key: key.clone(),
                    cause,
                })?;
            tracing::debug!(%key, "seeded object");
            Ok::<(), Error>(())
        })
        .await?;

    Ok(keyspace.size() * object_size)
}

/// Deterministic pseudo-random contents of a seeded object.
///
/// The same seed always produces the same bytes.
#[derive(Debug, Clone)]
pub struct Payload {
    /// The remaining length of the payload in bytes.
    pub len: u64,
    rng: SmallRng,
}

impl Payload {
    /// Creates a payload of `len` bytes generated from `seed`.
    pub fn new(len: u64, seed: u64) -> Self {
        Self {
            len,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl AsyncRead for Payload {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> task::Poll<io::Result<()>> {
        let len_to_fill = (buf.remaining() as u64).min(self.len) as usize;

        let fill_buf = buf.initialize_unfilled_to(len_to_fill);
        self.rng.fill_bytes(fill_buf);

        self.len -= len_to_fill as u64;
        buf.advance(len_to_fill);

        task::Poll::Ready(Ok(()))
    }
}
