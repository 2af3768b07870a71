//! Mock tool runner for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::pipeline::{PipelineError, ToolInvocation, ToolOutput, ToolRunner};
use crate::transport::RunContext;

#[derive(Debug, Clone)]
enum Failure {
    Exit { code: i32, output: String },
    Spawn,
}

#[derive(Debug, Clone)]
struct FailureRule {
    program: String,
    subcommand: Option<String>,
    failure: Failure,
}

impl FailureRule {
    fn matches(&self, invocation: &ToolInvocation) -> bool {
        program_name(&invocation.program) == self.program
            && self
                .subcommand
                .as_deref()
                .map_or(true, |sub| invocation.subcommand() == Some(sub))
    }
}

fn program_name(program: &Path) -> &str {
    program
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
}

/// Mock implementation of the ToolRunner trait.
///
/// Records every invocation. Unless told to fail, tools succeed and leave a
/// small output behind: `recon run` writes `result.csv` into its `--out`
/// directory and `auditpack run` writes `manifest.json` into its `--out`.
/// Programs are matched by file name, so `/usr/bin/recon` matches `"recon"`.
#[derive(Debug, Clone, Default)]
pub struct MockToolRunner {
    invocations: Arc<RwLock<Vec<ToolInvocation>>>,
    failures: Arc<RwLock<Vec<FailureRule>>>,
}

impl MockToolRunner {
    /// Create a new mock runner where every tool succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded invocations.
    pub async fn invocations(&self) -> Vec<ToolInvocation> {
        self.invocations.read().await.clone()
    }

    /// Every subcommand of `program` exits with `code` and prints `output`.
    pub async fn fail_tool(&self, program: &str, code: i32, output: &str) {
        self.push_rule(program, None, Failure::Exit {
            code,
            output: output.to_string(),
        })
        .await;
    }

    /// `program <subcommand>` exits with `code` and prints `output`.
    pub async fn fail_subcommand(&self, program: &str, subcommand: &str, code: i32, output: &str) {
        self.push_rule(program, Some(subcommand), Failure::Exit {
            code,
            output: output.to_string(),
        })
        .await;
    }

    /// `program` cannot be started at all.
    pub async fn fail_spawn(&self, program: &str) {
        self.push_rule(program, None, Failure::Spawn).await;
    }

    async fn push_rule(&self, program: &str, subcommand: Option<&str>, failure: Failure) {
        self.failures.write().await.push(FailureRule {
            program: program.to_string(),
            subcommand: subcommand.map(str::to_string),
            failure,
        });
    }

    async fn write_outputs(invocation: &ToolInvocation) -> std::io::Result<()> {
        let file = match (program_name(&invocation.program), invocation.subcommand()) {
            ("recon", Some("run")) => "result.csv",
            ("auditpack", Some("run")) => "manifest.json",
            _ => return Ok(()),
        };
        if let Some(out) = invocation.flag_value("--out") {
            tokio::fs::create_dir_all(out).await?;
            tokio::fs::write(out.join(file), b"ok\n").await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ToolRunner for MockToolRunner {
    fn name(&self) -> &str {
        "mock"
    }

    async fn run(
        &self,
        ctx: &RunContext,
        invocation: &ToolInvocation,
    ) -> Result<ToolOutput, PipelineError> {
        ctx.check()?;
        self.invocations.write().await.push(invocation.clone());

        let rule = self
            .failures
            .read()
            .await
            .iter()
            .find(|r| r.matches(invocation))
            .cloned();

        match rule.map(|r| r.failure) {
            Some(Failure::Exit { code, output }) => Ok(ToolOutput::failure(code, output)),
            Some(Failure::Spawn) => Err(PipelineError::Spawn {
                program: invocation.program.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "No such file or directory"),
            }),
            None => {
                Self::write_outputs(invocation)
                    .await
                    .map_err(|source| PipelineError::Spawn {
                        program: invocation.program.clone(),
                        source,
                    })?;
                Ok(ToolOutput::success(""))
            }
        }
    }
}
