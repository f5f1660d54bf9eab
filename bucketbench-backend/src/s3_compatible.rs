use std::{fmt, io};

use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::CONTENT_LENGTH;
use reqwest::{Body, RequestBuilder, StatusCode};

use crate::common::{
    Backend, BackendError, BackendResult, GetResponse, PayloadStream, reqwest_client,
};

/// A backend talking plain HTTP to an S3-compatible service.
///
/// Objects are addressed path-style as `<endpoint>/<bucket>/<key>`. Requests optionally
/// carry a bearer token; request signing is left to a proxy in front of the service.
pub struct S3Compatible {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl S3Compatible {
    /// Creates a backend for the given endpoint that sends unauthenticated requests.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(endpoint: &str) -> BackendResult<Self> {
        Ok(Self {
            client: reqwest_client()?,
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            token: None,
        })
    }

    /// Attaches `token` as bearer authorization to every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/{bucket}/{key}", self.endpoint)
    }
}

impl fmt::Debug for S3Compatible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Compatible")
            .field("endpoint", &self.endpoint)
            .field("authenticated", &self.token.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Backend for S3Compatible {
    fn name(&self) -> &'static str {
        "s3-compatible"
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse> {
        tracing::trace!("Requesting object from s3-compatible backend");

        let builder = self.request(self.client.get(self.object_url(bucket, key)));
        let response = builder
            .send()
            .await
            .map_err(|cause| BackendError::Reqwest {
                context: format!("failed to request `{key}`"),
                cause,
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            });
        }

        let response = response
            .error_for_status()
            .map_err(|cause| BackendError::Reqwest {
                context: format!("unexpected response for `{key}`"),
                cause,
            })?;

        let content_length =
            response
                .content_length()
                .ok_or_else(|| BackendError::MissingContentLength {
                    key: key.to_owned(),
                })?;

        let stream = response.bytes_stream().map_err(io::Error::other).boxed();
        Ok(GetResponse {
            content_length,
            stream,
        })
    }

    #[tracing::instrument(level = "trace", skip(self, stream))]
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        content_length: u64,
        stream: PayloadStream,
    ) -> BackendResult<()> {
        tracing::trace!("Writing object to s3-compatible backend");

        let builder = self.request(self.client.put(self.object_url(bucket, key)));
        builder
            .header(CONTENT_LENGTH, content_length)
            .body(Body::wrap_stream(stream))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|cause| BackendError::Reqwest {
                context: format!("failed to upload `{key}`"),
                cause,
            })?;

        Ok(())
    }
}
