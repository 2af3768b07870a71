use finpipe_core::{Config, RunOrchestrator, SanitizedConfig, ToolRunner};
use std::sync::Arc;

/// Shared application state
pub struct AppState<R: ToolRunner + 'static> {
    config: Config,
    orchestrator: Arc<RunOrchestrator<R>>,
}

impl<R: ToolRunner + 'static> AppState<R> {
    pub fn new(config: Config, orchestrator: Arc<RunOrchestrator<R>>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orchestrator(&self) -> &RunOrchestrator<R> {
        self.orchestrator.as_ref()
    }
}
