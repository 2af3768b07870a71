use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::error::PipelineError;
use crate::runid::RunId;

/// Evidence written under `tree/` when the reconciliation tool fails.
pub const EVIDENCE_FILE: &str = "error.txt";

/// One external command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// First argument, i.e. the subcommand for both tools.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().and_then(|a| a.to_str())
    }

    /// Value following `--flag`, if present.
    pub fn flag_value(&self, flag: &str) -> Option<&Path> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(Path::new)
    }
}

/// What a finished tool reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal.
    pub status_code: Option<i32>,
    pub success: bool,
    /// Stdout followed by stderr.
    pub combined: String,
}

impl ToolOutput {
    pub fn success(combined: impl Into<String>) -> Self {
        Self {
            status_code: Some(0),
            success: true,
            combined: combined.into(),
        }
    }

    pub fn failure(code: i32, combined: impl Into<String>) -> Self {
        Self {
            status_code: Some(code),
            success: false,
            combined: combined.into(),
        }
    }

    pub fn status_description(&self) -> String {
        match self.status_code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Inputs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub left: PathBuf,
    pub right: PathBuf,
    /// Parent of the run directory; the run lands in `out_base/<run_id>`.
    pub out_base: PathBuf,
    pub run_id: RunId,
    /// Pack label; defaults to `job:<run_id>`.
    pub label: Option<String>,
}

/// Directory layout of a run:
///
/// ```text
/// <out_base>/<run_id>/
///   tree/inputs/{left,right}.csv
///   tree/work/
///   tree/error.txt        (only when recon failed)
///   pack/
///   _SUCCESS.json | _ERROR.json
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub run_dir: PathBuf,
    pub tree_dir: PathBuf,
    pub inputs_dir: PathBuf,
    pub work_dir: PathBuf,
    pub pack_dir: PathBuf,
}

impl RunLayout {
    pub fn new(out_base: &Path, run_id: &RunId) -> Self {
        let run_dir = out_base.join(run_id.as_str());
        let tree_dir = run_dir.join("tree");
        Self {
            inputs_dir: tree_dir.join("inputs"),
            work_dir: tree_dir.join("work"),
            pack_dir: run_dir.join("pack"),
            tree_dir,
            run_dir,
        }
    }

    pub fn left_input(&self) -> PathBuf {
        self.inputs_dir.join("left.csv")
    }

    pub fn right_input(&self) -> PathBuf {
        self.inputs_dir.join("right.csv")
    }

    pub fn evidence_file(&self) -> PathBuf {
        self.tree_dir.join(EVIDENCE_FILE)
    }
}

/// A pipeline that got as far as running tools.
#[derive(Debug)]
pub struct PipelineRun {
    pub layout: RunLayout,
    /// The run's reported result. Tool failures land here, not in the outer `Err`.
    pub outcome: Result<(), PipelineError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let id = RunId::parse("demo").unwrap();
        let layout = RunLayout::new(Path::new("/tmp/out"), &id);

        assert_eq!(layout.run_dir, PathBuf::from("/tmp/out/demo"));
        assert_eq!(layout.work_dir, PathBuf::from("/tmp/out/demo/tree/work"));
        assert_eq!(layout.pack_dir, PathBuf::from("/tmp/out/demo/pack"));
        assert_eq!(
            layout.right_input(),
            PathBuf::from("/tmp/out/demo/tree/inputs/right.csv")
        );
        assert_eq!(
            layout.evidence_file(),
            PathBuf::from("/tmp/out/demo/tree/error.txt")
        );
    }

    #[test]
    fn test_invocation_flag_lookup() {
        let inv = ToolInvocation::new("auditpack")
            .arg("verify")
            .arg("--pack")
            .arg("/p");
        assert_eq!(inv.subcommand(), Some("verify"));
        assert_eq!(inv.flag_value("--pack"), Some(Path::new("/p")));
        assert_eq!(inv.flag_value("--in"), None);
    }

    #[test]
    fn test_status_description() {
        assert_eq!(ToolOutput::failure(3, "").status_description(), "exit status 3");
        let killed = ToolOutput {
            status_code: None,
            success: false,
            combined: String::new(),
        };
        assert_eq!(killed.status_description(), "terminated by signal");
    }
}
