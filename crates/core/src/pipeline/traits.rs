//! Trait definitions for the pipeline module.

use async_trait::async_trait;

use super::error::PipelineError;
use super::types::{ToolInvocation, ToolOutput};
use crate::transport::RunContext;

/// Runs external tools to completion.
///
/// A tool that starts and exits non-zero is `Ok` with `success == false`.
/// `Err` is reserved for tools that could not be started and for runs that
/// were cancelled or timed out.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Returns the name of this runner implementation.
    fn name(&self) -> &str;

    async fn run(
        &self,
        ctx: &RunContext,
        invocation: &ToolInvocation,
    ) -> Result<ToolOutput, PipelineError>;
}
