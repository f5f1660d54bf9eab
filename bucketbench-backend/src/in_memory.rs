//! In-memory backend for tests.
//!
//! This provides a [`Backend`] backed by a `HashMap`, removing the need for a running
//! storage service in tests. The backend is [`Clone`] so tests can hold a handle for
//! direct inspection while the harness owns a shared copy.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Bytes, BytesMut};
use futures_util::{StreamExt, TryStreamExt};

use crate::common::{Backend, BackendError, BackendResult, GetResponse, PayloadStream};

/// Size of the chunks that object bodies are served in.
const CHUNK_SIZE: usize = 64 * 1024;

type Store = HashMap<(String, String), Bytes>;

/// A [`Backend`] keeping all objects in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<Mutex<Store>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `contents` at `key` in `bucket`, bypassing the `Backend` trait.
    pub fn insert(&self, bucket: &str, key: &str, contents: impl Into<Bytes>) {
        self.lock()
            .insert((bucket.to_owned(), key.to_owned()), contents.into());
    }

    /// Returns a clone of the stored contents, if present.
    pub fn get_stored(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    /// Returns the number of stored objects.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` if the backend has no stored objects.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        // A poisoned map only means a test panicked while holding it.
        self.store
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse> {
        let contents = self
            .get_stored(bucket, key)
            .ok_or_else(|| BackendError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;

        let content_length = contents.len() as u64;
        let chunks: Vec<std::io::Result<Bytes>> = (0..contents.len())
            .step_by(CHUNK_SIZE)
            .map(|start| {
                let end = (start + CHUNK_SIZE).min(contents.len());
                Ok(contents.slice(start..end))
            })
            .collect();

        Ok(GetResponse {
            content_length,
            stream: futures_util::stream::iter(chunks).boxed(),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_length: u64,
        stream: PayloadStream,
    ) -> BackendResult<()> {
        let bytes: BytesMut = stream.try_collect().await?;
        if bytes.len() as u64 != content_length {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "expected {content_length} bytes for `{key}`, received {}",
                    bytes.len()
                ),
            )
            .into());
        }
        self.insert(bucket, key, bytes.freeze());
        Ok(())
    }
}
