//! Error types for the pipeline module.

use std::path::PathBuf;
use thiserror::Error;

use crate::transport::Interrupted;

/// Errors that can occur while preparing or running a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Run directory could not be reset or created.
    #[error("failed to prepare {path}: {source}")]
    Layout {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file could not be copied into the run tree.
    #[error("failed to stage {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A tool binary could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The reconciliation tool failed; the pack was still built and verified.
    #[error("recon failed (pack still produced + verified). See tree/error.txt\n{output}")]
    ReconFailed { output: String },

    /// Building the pack failed.
    #[error("auditpack run failed: {status}\n{output}")]
    PackFailed { status: String, output: String },

    /// The built pack did not verify.
    #[error("auditpack verify failed: {status}\n{output}")]
    VerifyFailed { status: String, output: String },

    /// The run was cancelled or ran out of time.
    #[error(transparent)]
    Interrupted(#[from] Interrupted),
}

impl PipelineError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted(_))
    }

    /// Whether a tool ran and reported failure, as opposed to a local setup problem.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::ReconFailed { .. } | Self::PackFailed { .. } | Self::VerifyFailed { .. }
        )
    }
}
