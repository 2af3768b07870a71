pub mod atomic_fs;
pub mod config;
pub mod event;
pub mod orchestrator;
pub mod pipeline;
pub mod runid;
pub mod storage;
pub mod testing;
pub mod token;
pub mod transport;

pub use config::{
    apply_env_overrides, load_config, load_config_from_str, validate_config, Config, ConfigError,
    SanitizedConfig,
};
pub use event::{parse_and_decide, ContractError, EventDecision, ObjectDescriptor};
pub use orchestrator::{
    build_orchestrator, CompletionMarker, MarkerStatus, Notification, OrchestratorError,
    RunOrchestrator, RunOutcome,
};
pub use pipeline::{
    CommandRunner, PipelineCoordinator, PipelineError, PipelineRequest, PipelineRun, RunLayout,
    ToolRunner,
};
pub use runid::{derive_run_id, parse_run_id, RunId, RunIdError};
pub use storage::{GcsObjectStore, ObjectStore, StorageError};
pub use token::{create_token_provider, CredentialError, TokenProvider};
pub use transport::{run_with_retry, Interrupted, RetryPolicy, RunContext, TransportError};
