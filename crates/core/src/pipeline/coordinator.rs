//! Runs the two tools over a freshly staged run directory.

use std::io;
use std::path::Path;

use tracing::{info, warn};

use super::error::PipelineError;
use super::traits::ToolRunner;
use super::types::{PipelineRequest, PipelineRun, RunLayout, ToolInvocation, ToolOutput};
use crate::atomic_fs::{copy_atomic, write_atomic};
use crate::config::PipelineConfig;
use crate::transport::RunContext;

/// Stages inputs, runs recon, then builds and verifies the pack.
///
/// The pack is built even when recon fails; a recon failure is reported only
/// once the pack has been verified.
pub struct PipelineCoordinator<R: ToolRunner> {
    config: PipelineConfig,
    runner: R,
}

impl<R: ToolRunner> PipelineCoordinator<R> {
    pub fn new(config: PipelineConfig, runner: R) -> Self {
        Self { config, runner }
    }

    /// Runs the pipeline.
    ///
    /// `Err` means the run directory could not be prepared or the run was
    /// interrupted. Tool failures are reported through [`PipelineRun::outcome`].
    pub async fn run(
        &self,
        ctx: &RunContext,
        request: &PipelineRequest,
    ) -> Result<PipelineRun, PipelineError> {
        ctx.check()?;

        let layout = RunLayout::new(&request.out_base, &request.run_id);
        prepare_layout(&layout).await?;

        let left = layout.left_input();
        let right = layout.right_input();
        stage(&request.left, &left).await?;
        stage(&request.right, &right).await?;

        let label = request
            .label
            .clone()
            .or_else(|| self.config.label.clone())
            .unwrap_or_else(|| format!("job:{}", request.run_id));

        let recon = ToolInvocation::new(&self.config.recon_bin)
            .arg("run")
            .arg("--left")
            .arg(&left)
            .arg("--right")
            .arg(&right)
            .arg("--out")
            .arg(&layout.work_dir);
        let recon_failure = match self.invoke(ctx, &recon).await? {
            Ok(_) => None,
            Err(output) => {
                warn!(run_id = %request.run_id, "Recon failed, building pack with evidence");
                if let Err(e) = write_atomic(&layout.evidence_file(), output.as_bytes()).await {
                    warn!(path = %layout.evidence_file().display(), error = %e, "Failed to write evidence");
                }
                Some(output)
            }
        };

        let pack = ToolInvocation::new(&self.config.auditpack_bin)
            .arg("run")
            .arg("--in")
            .arg(&layout.tree_dir)
            .arg("--out")
            .arg(&layout.pack_dir)
            .arg("--label")
            .arg(&label);
        if let Err((status, output)) = self.invoke_status(ctx, &pack).await? {
            return Ok(PipelineRun {
                layout,
                outcome: Err(PipelineError::PackFailed { status, output }),
            });
        }

        let verify = ToolInvocation::new(&self.config.auditpack_bin)
            .arg("verify")
            .arg("--pack")
            .arg(&layout.pack_dir);
        if let Err((status, output)) = self.invoke_status(ctx, &verify).await? {
            return Ok(PipelineRun {
                layout,
                outcome: Err(PipelineError::VerifyFailed { status, output }),
            });
        }

        let outcome = match recon_failure {
            Some(output) => Err(PipelineError::ReconFailed { output }),
            None => Ok(()),
        };
        info!(run_id = %request.run_id, ok = outcome.is_ok(), "Pipeline finished");
        Ok(PipelineRun { layout, outcome })
    }

    /// Runs one tool. The outer `Err` is an interruption; the inner one is the
    /// combined output of a failed tool, or the start error when it never ran.
    async fn invoke(
        &self,
        ctx: &RunContext,
        invocation: &ToolInvocation,
    ) -> Result<Result<ToolOutput, String>, PipelineError> {
        Ok(self
            .invoke_status(ctx, invocation)
            .await?
            .map_err(|(status, output)| if output.is_empty() { status } else { output }))
    }

    /// Like [`Self::invoke`], keeping the exit status and output apart.
    async fn invoke_status(
        &self,
        ctx: &RunContext,
        invocation: &ToolInvocation,
    ) -> Result<Result<ToolOutput, (String, String)>, PipelineError> {
        match self.runner.run(ctx, invocation).await {
            Ok(output) if output.success => Ok(Ok(output)),
            Ok(output) => Ok(Err((output.status_description(), output.combined))),
            Err(PipelineError::Interrupted(i)) => Err(i.into()),
            Err(e) => Ok(Err((e.to_string(), String::new()))),
        }
    }
}

async fn prepare_layout(layout: &RunLayout) -> Result<(), PipelineError> {
    let layout_err = |path: &Path, source| PipelineError::Layout {
        path: path.to_path_buf(),
        source,
    };

    match tokio::fs::remove_dir_all(&layout.run_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(layout_err(&layout.run_dir, e)),
    }

    for dir in [&layout.inputs_dir, &layout.work_dir, &layout.pack_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| layout_err(dir, e))?;
    }
    Ok(())
}

async fn stage(src: &Path, dst: &Path) -> Result<(), PipelineError> {
    copy_atomic(src, dst)
        .await
        .map(|_| ())
        .map_err(|source| PipelineError::Stage {
            path: src.to_path_buf(),
            source,
        })
}
