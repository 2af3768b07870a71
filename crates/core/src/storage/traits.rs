use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use super::walk::{collect_files, object_key};
use super::StorageError;
use crate::transport::RunContext;

/// The handful of object-store operations a run needs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns `Ok(false)` when the object does not exist.
    async fn exists(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        object: &str,
    ) -> Result<bool, StorageError>;

    /// Downloads an object to `dest`. `dest` is either absent or complete afterwards.
    async fn download(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        object: &str,
        dest: &Path,
    ) -> Result<(), StorageError>;

    /// Uploads `src`, overwriting any existing object.
    async fn upload(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        object: &str,
        src: &Path,
    ) -> Result<(), StorageError>;

    /// Uploads every regular file under `dir` to `prefix/<relative path>`, in
    /// relative-path order. Stops at the first failure. Returns the file count.
    async fn upload_directory(
        &self,
        ctx: &RunContext,
        token: &str,
        bucket: &str,
        prefix: &str,
        dir: &Path,
    ) -> Result<usize, StorageError> {
        let files = collect_files(dir).await?;
        for file in &files {
            let key = object_key(prefix, &file.relative);
            debug!(bucket, object = %key, "Uploading");
            self.upload(ctx, token, bucket, &key, &file.path).await?;
        }
        Ok(files.len())
    }

    /// Name of this store implementation
    fn name(&self) -> &str;
}
