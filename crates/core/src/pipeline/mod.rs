//! Pipeline module: drives the external recon and auditpack tools.
//!
//! Both tools are opaque. `recon run --left --right --out` reconciles the
//! two inputs into a work directory; `auditpack run --in --out --label`
//! bundles the tree into a pack and `auditpack verify --pack` checks it.

mod command;
mod coordinator;
mod error;
mod traits;
mod types;

pub use command::CommandRunner;
pub use coordinator::PipelineCoordinator;
pub use error::PipelineError;
pub use traits::ToolRunner;
pub use types::{
    PipelineRequest, PipelineRun, RunLayout, ToolInvocation, ToolOutput, EVIDENCE_FILE,
};
