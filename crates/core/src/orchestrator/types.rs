//! Types for the run orchestrator.

use std::path::PathBuf;
use thiserror::Error;

use super::marker::MarkerStatus;
use crate::runid::RunId;

/// A notification that passed the event contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub event_type: String,
    pub bucket: String,
    /// Canonical (unescaped) object name.
    pub object_name: String,
}

/// How a notification was handled. Every variant is acknowledged without retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Not a run trigger: wrong event type or bucket, or not `<prefix><id>/right.csv`.
    Ignored { reason: String },
    /// The payload could not be decoded.
    Malformed { reason: String },
    /// A completion marker already exists for this run.
    DuplicateSkipped { run_id: RunId, marker: String },
    /// The pipeline ran, the marker was written and the run directory uploaded.
    Completed {
        run_id: RunId,
        status: MarkerStatus,
        error: Option<String>,
        uploaded: usize,
    },
}

impl RunOutcome {
    /// Short label used for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ignored { .. } => "ignored",
            Self::Malformed { .. } => "contract_error",
            Self::DuplicateSkipped { .. } => "duplicate",
            Self::Completed {
                status: MarkerStatus::Success,
                ..
            } => "succeeded",
            Self::Completed { .. } => "failed",
        }
    }

    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            Self::DuplicateSkipped { run_id, .. } | Self::Completed { run_id, .. } => Some(run_id),
            _ => None,
        }
    }
}

/// Infrastructure failures. These are surfaced so the delivery is retried.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Temporary workspace could not be created.
    #[error("workspace error: {0}")]
    Workspace(#[source] std::io::Error),

    /// No bearer token.
    #[error("credential error: {0}")]
    Credential(#[from] crate::token::CredentialError),

    /// Object store call failed.
    #[error("storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    /// Run directory could not be prepared, or the pipeline was interrupted.
    #[error("pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    /// Completion marker could not be written.
    #[error("failed to write completion marker {path}: {source}")]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The run was cancelled or hit its deadline between steps.
    #[error(transparent)]
    Interrupted(#[from] crate::transport::Interrupted),
}

impl OrchestratorError {
    pub fn is_cancellation(&self) -> bool {
        match self {
            Self::Interrupted(_) => true,
            Self::Credential(e) => e.is_cancellation(),
            Self::Storage(e) => e.is_cancellation(),
            Self::Pipeline(e) => e.is_interrupted(),
            Self::Workspace(_) | Self::Marker { .. } => false,
        }
    }
}
