use std::fmt::Debug;
use std::io;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// User agent string used for outgoing requests.
pub const USER_AGENT: &str = concat!("bucketbench/", env!("CARGO_PKG_VERSION"));

/// The contents of an object, delivered in chunks.
///
/// Dropping the stream closes the underlying connection or file.
pub type PayloadStream = BoxStream<'static, io::Result<Bytes>>;

/// A [`Backend`] instance shared between all workers of a benchmark.
pub type SharedBackend = Arc<dyn Backend>;

/// A successful object retrieval.
pub struct GetResponse {
    /// The length of the object as declared by the backend before any body was read.
    pub content_length: u64,
    /// The object contents.
    pub stream: PayloadStream,
}

impl Debug for GetResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetResponse")
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// A storage service holding the objects that are benchmarked.
#[async_trait::async_trait]
pub trait Backend: Debug + Send + Sync + 'static {
    /// The backend name, used for diagnostics.
    fn name(&self) -> &'static str;

    /// Starts retrieving the object at `key` in `bucket`.
    ///
    /// Resolves as soon as the response headers are available. The body is read through
    /// the returned stream.
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse>;

    /// Stores an object of exactly `content_length` bytes at `key` in `bucket`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_length: u64,
        stream: PayloadStream,
    ) -> BackendResult<()>;
}

/// Errors returned by a [`Backend`].
#[derive(Debug, Error)]
pub enum BackendError {
    /// IO errors related to payload streaming or file operations.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// All errors stemming from the reqwest client.
    ///
    /// These can be network errors encountered when sending the requests, but can also
    /// indicate error statuses returned by the storage service itself.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// The operation that failed.
        context: String,
        /// The underlying client error.
        #[source]
        cause: reqwest::Error,
    },

    /// The requested object does not exist.
    #[error("object `{key}` not found in bucket `{bucket}`")]
    NotFound {
        /// The bucket that was searched.
        bucket: String,
        /// The missing key.
        key: String,
    },

    /// The backend did not declare the length of the object.
    #[error("response for `{key}` carries no content length")]
    MissingContentLength {
        /// The requested key.
        key: String,
    },
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Creates a reqwest client with required defaults.
///
/// # Errors
///
/// Fails if the TLS backend cannot be initialized.
pub fn reqwest_client() -> BackendResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .map_err(|cause| BackendError::Reqwest {
            context: "failed to build HTTP client".to_owned(),
            cause,
        })
}
