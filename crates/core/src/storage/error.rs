//! Error types for the storage module.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::RetryError;

/// Errors that can occur while talking to the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A remote call failed after the retry policy gave up.
    #[error("gs://{bucket}/{object}: {source}")]
    Transport {
        bucket: String,
        object: String,
        #[source]
        source: RetryError,
    },

    /// The local directory could not be enumerated.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A local path cannot be expressed as an object key.
    #[error("path is not valid UTF-8: {path}")]
    InvalidPath { path: PathBuf },
}

impl StorageError {
    pub fn transport(bucket: impl Into<String>, object: impl Into<String>, source: RetryError) -> Self {
        Self::Transport {
            bucket: bucket.into(),
            object: object.into(),
            source,
        }
    }

    /// Whether the call was abandoned because the run was cancelled or timed out.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_cancellation())
    }

    /// Whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_retryable())
    }

    /// HTTP status of the last attempt, if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Transport { source, .. } => source.source.status_code(),
            _ => None,
        }
    }
}
