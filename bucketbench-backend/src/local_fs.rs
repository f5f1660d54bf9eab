use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::pin::pin;

use futures_util::StreamExt;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::{ReaderStream, StreamReader};

use crate::common::{Backend, BackendError, BackendResult, GetResponse, PayloadStream};

/// A backend serving objects from files below a root directory.
///
/// The object `key` in `bucket` lives at `<root>/<bucket>/<key>`.
#[derive(Debug)]
pub struct LocalFs {
    path: PathBuf,
}

impl LocalFs {
    /// Creates a backend rooted at `path`.
    pub fn new(path: &Path) -> Self {
        Self { path: path.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.path.join(bucket).join(key)
    }
}

#[async_trait::async_trait]
impl Backend for LocalFs {
    fn name(&self) -> &'static str {
        "local-fs"
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn get_object(&self, bucket: &str, key: &str) -> BackendResult<GetResponse> {
        let path = self.object_path(bucket, key);
        let file = match OpenOptions::new().read(true).open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(BackendError::NotFound {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let content_length = file.metadata().await?.len();
        let stream = ReaderStream::new(file).boxed();
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
        let path = self.object_path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;

        let mut reader = pin!(StreamReader::new(stream));
        let mut writer = BufWriter::new(file);

        let written = tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        let file = writer.into_inner();
        file.sync_data().await?;

        if written != content_length {
            tokio::fs::remove_file(&path).await?;
            return Err(std::io::Error::new(
                ErrorKind::InvalidData,
                format!("expected {content_length} bytes for `{key}`, wrote {written}"),
            )
            .into());
        }

        Ok(())
    }
}
