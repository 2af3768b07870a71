//! Subprocess-backed tool runner.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::error::PipelineError;
use super::traits::ToolRunner;
use super::types::{ToolInvocation, ToolOutput};
use crate::transport::RunContext;

/// Runs tools as child processes, killing them if the run context ends first.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner;

impl CommandRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for CommandRunner {
    fn name(&self) -> &str {
        "command"
    }

    async fn run(
        &self,
        ctx: &RunContext,
        invocation: &ToolInvocation,
    ) -> Result<ToolOutput, PipelineError> {
        ctx.check()?;

        let child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        // Dropping the wait future on cancellation drops the child, which kills it.
        let output = ctx
            .run(child.wait_with_output())
            .await?
            .map_err(|source| PipelineError::Spawn {
                program: invocation.program.clone(),
                source,
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        debug!(
            program = %invocation.program.display(),
            status = ?output.status.code(),
            "Tool finished"
        );

        Ok(ToolOutput {
            status_code: output.status.code(),
            success: output.status.success(),
            combined,
        })
    }
}
