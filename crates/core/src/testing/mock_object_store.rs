//! In-memory object store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::atomic_fs::write_atomic;
use crate::storage::{ObjectStore, StorageError};
use crate::transport::{RetryError, RunContext, TransportError};

/// Store operation, for recorded calls and injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Exists,
    Download,
    Upload,
}

impl StoreOp {
    fn as_str(self) -> &'static str {
        match self {
            Self::Exists => "exists",
            Self::Download => "download",
            Self::Upload => "upload",
        }
    }
}

/// A recorded store call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub bucket: String,
    pub object: String,
}

/// Mock implementation of the ObjectStore trait.
///
/// Objects live in memory keyed by `(bucket, object)`. Missing objects answer
/// downloads with a 404; any call can be made to fail with a given status.
///
/// # Example
///
/// ```rust,ignore
/// use finpipe_core::testing::{MockObjectStore, StoreOp};
///
/// let store = MockObjectStore::new();
/// store.put_object("in-bkt", "in/demo/left.csv", b"id\n1\n").await;
/// store.fail_on(StoreOp::Upload, "out/demo/_SUCCESS.json", 503).await;
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockObjectStore {
    objects: Arc<RwLock<BTreeMap<(String, String), Vec<u8>>>>,
    calls: Arc<RwLock<Vec<StoreCall>>>,
    failures: Arc<RwLock<HashMap<(StoreOp, String), u16>>>,
}

impl MockObjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_object(&self, bucket: &str, object: &str, bytes: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), object.to_string()), bytes.into());
    }

    pub async fn object(&self, bucket: &str, object: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), object.to_string()))
            .cloned()
    }

    /// Object names in `bucket` starting with `prefix`, sorted.
    pub async fn list(&self, bucket: &str, prefix: &str) -> Vec<String> {
        self.objects
            .read()
            .await
            .keys()
            .filter(|(b, o)| b == bucket && o.starts_with(prefix))
            .map(|(_, o)| o.clone())
            .collect()
    }

    /// Make every `op` on `object` fail with `status`.
    pub async fn fail_on(&self, op: StoreOp, object: &str, status: u16) {
        self.failures
            .write()
            .await
            .insert((op, object.to_string()), status);
    }

    /// Get all recorded calls.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.calls.read().await.clone()
    }

    /// Objects touched by `op`, in call order.
    pub async fn calls_for(&self, op: StoreOp) -> Vec<String> {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| c.op == op)
            .map(|c| c.object.clone())
            .collect()
    }

    async fn record(&self, op: StoreOp, bucket: &str, object: &str) -> Result<(), StorageError> {
        self.calls.write().await.push(StoreCall {
            op,
            bucket: bucket.to_string(),
            object: object.to_string(),
        });

        match self.failures.read().await.get(&(op, object.to_string())) {
            Some(status) => Err(status_failure(op, bucket, object, *status)),
            None => Ok(()),
        }
    }
}

fn status_failure(op: StoreOp, bucket: &str, object: &str, status: u16) -> StorageError {
    StorageError::transport(
        bucket,
        object,
        RetryError {
            operation: op.as_str().to_string(),
            attempts: 1,
            source: TransportError::status(status, ""),
        },
    )
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn exists(
        &self,
        ctx: &RunContext,
        _token: &str,
        bucket: &str,
        object: &str,
    ) -> Result<bool, StorageError> {
        check(ctx, StoreOp::Exists, bucket, object)?;
        self.record(StoreOp::Exists, bucket, object).await?;
        Ok(self.object(bucket, object).await.is_some())
    }

    async fn download(
        &self,
        ctx: &RunContext,
        _token: &str,
        bucket: &str,
        object: &str,
        dest: &Path,
    ) -> Result<(), StorageError> {
        check(ctx, StoreOp::Download, bucket, object)?;
        self.record(StoreOp::Download, bucket, object).await?;
        let bytes = self
            .object(bucket, object)
            .await
            .ok_or_else(|| status_failure(StoreOp::Download, bucket, object, 404))?;

        let io_failure = |e: std::io::Error| {
            StorageError::transport(
                bucket,
                object,
                RetryError {
                    operation: "download".to_string(),
                    attempts: 1,
                    source: TransportError::Io(e),
                },
            )
        };
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_failure)?;
        }
        write_atomic(dest, &bytes).await.map_err(io_failure)
    }

    async fn upload(
        &self,
        ctx: &RunContext,
        _token: &str,
        bucket: &str,
        object: &str,
        src: &Path,
    ) -> Result<(), StorageError> {
        check(ctx, StoreOp::Upload, bucket, object)?;
        self.record(StoreOp::Upload, bucket, object).await?;
        let bytes = tokio::fs::read(src).await.map_err(|e| {
            StorageError::transport(
                bucket,
                object,
                RetryError {
                    operation: "upload".to_string(),
                    attempts: 1,
                    source: TransportError::Io(e),
                },
            )
        })?;
        self.put_object(bucket, object, bytes).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

fn check(ctx: &RunContext, op: StoreOp, bucket: &str, object: &str) -> Result<(), StorageError> {
    ctx.check().map_err(|i| {
        StorageError::transport(
            bucket,
            object,
            RetryError {
                operation: op.as_str().to_string(),
                attempts: 0,
                source: i.into(),
            },
        )
    })
}
