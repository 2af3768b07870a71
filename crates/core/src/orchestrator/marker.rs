//! Completion markers.
//!
//! A run directory gets exactly one of `_SUCCESS.json` or `_ERROR.json` once the
//! pipeline has finished. Its presence in the output bucket is what marks a run
//! as done for later deliveries of the same notification.

use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};

use crate::atomic_fs::write_atomic;
use crate::pipeline::PipelineError;
use crate::runid::RunId;

pub const SUCCESS_MARKER: &str = "_SUCCESS.json";
pub const ERROR_MARKER: &str = "_ERROR.json";

/// Marker names in the order they are checked.
pub const MARKER_FILES: [&str; 2] = [SUCCESS_MARKER, ERROR_MARKER];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStatus {
    Success,
    Error,
}

impl MarkerStatus {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Success => SUCCESS_MARKER,
            Self::Error => ERROR_MARKER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub run_id: RunId,
    pub status: MarkerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompletionMarker {
    pub fn success(run_id: RunId) -> Self {
        Self {
            run_id,
            status: MarkerStatus::Success,
            error: None,
        }
    }

    /// Error marker carrying only the first line of `message`, so tool output
    /// and temp paths stay out of the marker.
    pub fn failure(run_id: RunId, message: &str) -> Self {
        let summary = message.lines().next().unwrap_or_default().trim();
        Self {
            run_id,
            status: MarkerStatus::Error,
            error: (!summary.is_empty()).then(|| summary.to_string()),
        }
    }

    pub fn from_outcome(run_id: RunId, outcome: &Result<(), PipelineError>) -> Self {
        match outcome {
            Ok(()) => Self::success(run_id),
            Err(e) => Self::failure(run_id, &e.to_string()),
        }
    }

    pub fn file_name(&self) -> &'static str {
        self.status.file_name()
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Atomically writes the marker into `run_dir` and returns its path.
    pub async fn write(&self, run_dir: &Path) -> io::Result<PathBuf> {
        let path = run_dir.join(self.file_name());
        write_atomic(&path, &self.to_bytes()?).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn demo() -> RunId {
        RunId::parse("demo").unwrap()
    }

    #[test]
    fn test_success_json_shape() {
        let bytes = CompletionMarker::success(demo()).to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "{\n  \"run_id\": \"demo\",\n  \"status\": \"success\"\n}\n");
    }

    #[test]
    fn test_failure_keeps_first_line_only() {
        let marker = CompletionMarker::failure(
            demo(),
            "  recon failed (pack still produced + verified). See tree/error.txt \n/tmp/x: bad row\n",
        );
        assert_eq!(marker.status, MarkerStatus::Error);
        assert_eq!(
            marker.error.as_deref(),
            Some("recon failed (pack still produced + verified). See tree/error.txt")
        );
        assert_eq!(marker.file_name(), ERROR_MARKER);
    }

    #[test]
    fn test_from_outcome() {
        let ok = CompletionMarker::from_outcome(demo(), &Ok(()));
        assert_eq!(ok.file_name(), SUCCESS_MARKER);

        let err = CompletionMarker::from_outcome(
            demo(),
            &Err(PipelineError::VerifyFailed {
                status: "exit status 1".to_string(),
                output: "digest mismatch".to_string(),
            }),
        );
        assert_eq!(
            err.error.as_deref(),
            Some("auditpack verify failed: exit status 1")
        );
    }

    #[tokio::test]
    async fn test_write_round_trips() {
        let dir = TempDir::new().unwrap();
        let marker = CompletionMarker::failure(demo(), "boom");

        let path = marker.write(dir.path()).await.unwrap();

        assert_eq!(path, dir.path().join(ERROR_MARKER));
        let read: CompletionMarker =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(read, marker);
    }
}
