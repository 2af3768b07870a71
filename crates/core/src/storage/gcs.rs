//! Google Cloud Storage JSON API client.

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::path::Path;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use super::{ObjectStore, StorageError};
use crate::atomic_fs::AtomicWriter;
use crate::config::{RetryConfig, StorageConfig};
use crate::transport::{run_with_retry, status_error, RetryPolicy, RunContext, TransportError};

const MAX_ERROR_BODY_BYTES: usize = 4096;
const MAX_METADATA_ERROR_BODY_BYTES: usize = 8 << 10;

/// [`ObjectStore`] backed by the GCS REST endpoints.
pub struct GcsObjectStore {
    client: reqwest::Client,
    api_base_url: String,
    upload_base_url: String,
    metadata_policy: RetryPolicy,
    download_policy: RetryPolicy,
    upload_policy: RetryPolicy,
}

impl GcsObjectStore {
    pub fn new(client: reqwest::Client, storage: &StorageConfig, retry: &RetryConfig) -> Self {
        Self {
            client,
            api_base_url: storage.api_base_url.trim_end_matches('/').to_string(),
            upload_base_url: storage.upload_base_url.trim_end_matches('/').to_string(),
            metadata_policy: RetryPolicy::from_config(retry, retry.metadata_timeout()),
            download_policy: RetryPolicy::from_config(retry, retry.download_timeout()),
            upload_policy: RetryPolicy::from_config(retry, retry.upload_timeout()),
        }
    }

    fn object_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/b/{}/o/{}",
            self.api_base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        )
    }

    fn upload_url(&self, bucket: &str, object: &str) -> String {
        format!(
            "{}/b/{}/o?uploadType=media&name={}",
            self.upload_base_url,
            urlencoding::encode(bucket),
            urlencoding::encode(object)
        )
    }

    async fn exists_once(&self, url: &str, token: &str) -> Result<bool, TransportError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer(token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(true)
        } else if status.as_u16() == 404 {
            Ok(false)
        } else {
            Err(status_error(response, MAX_METADATA_ERROR_BODY_BYTES).await)
        }
    }

    async fn download_once(&self, url: &str, token: &str, dest: &Path) -> Result<(), TransportError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, bearer(token))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, MAX_ERROR_BODY_BYTES).await);
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Dropping the writer on any early return removes the partial temp file.
        let mut writer = AtomicWriter::create(dest).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.try_next().await? {
            writer.write_all(&chunk).await?;
        }
        writer.commit().await?;
        Ok(())
    }

    async fn upload_once(&self, url: &str, token: &str, src: &Path) -> Result<(), TransportError> {
        // Reopened for every attempt; a consumed stream cannot be replayed.
        let file = tokio::fs::File::open(src).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));

        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, bearer(token))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, MAX_ERROR_BODY_BYTES).await);
        }
        Ok(())
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[async_trait]
impl ObjectStore for GcsObjectStore {
    async fn exists(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        object: &str,
    ) -> Result<bool, StorageError> {
        let url = self.object_url(bucket, object);
        let found = run_with_retry(ctx, &self.metadata_policy, "exists", |_| {
            self.exists_once(&url, token)
        })
        .await
        .map_err(|e| StorageError::transport(bucket, object, e))?;

        debug!(bucket, object, found, "Checked object");
        Ok(found)
    }

    async fn download(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        object: &str,
        dest: &Path,
    ) -> Result<(), StorageError> {
        let url = format!("{}?alt=media", self.object_url(bucket, object));
        run_with_retry(ctx, &self.download_policy, "download", |_| {
            self.download_once(&url, token, dest)
        })
        .await
        .map_err(|e| StorageError::transport(bucket, object, e))?;

        info!(bucket, object, dest = %dest.display(), "Downloaded object");
        Ok(())
    }

    async fn upload(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        object: &str,
        src: &Path,
    ) -> Result<(), StorageError> {
        let url = self.upload_url(bucket, object);
        run_with_retry(ctx, &self.upload_policy, "upload", |_| {
            self.upload_once(&url, token, src)
        })
        .await
        .map_err(|e| StorageError::transport(bucket, object, e))?;

        debug!(bucket, object, "Uploaded object");
        Ok(())
    }

    fn name(&self) -> &str {
        "gcs"
    }
}
