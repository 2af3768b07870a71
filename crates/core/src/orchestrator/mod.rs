//! Run orchestrator for storage notifications.
//!
//! One notification maps to at most one run. Duplicate deliveries are
//! detected through the completion marker in the output bucket; two
//! deliveries racing past that check may both execute, and since every
//! upload is a full overwrite the last writer wins.

mod marker;
mod runner;
mod types;

pub use marker::{CompletionMarker, MarkerStatus, ERROR_MARKER, MARKER_FILES, SUCCESS_MARKER};
pub use runner::{build_orchestrator, RunOrchestrator};
pub use types::{Notification, OrchestratorError, RunOutcome};
