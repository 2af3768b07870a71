//! Run orchestrator implementation.
//!
//! Handles one notification at a time, strictly in order:
//! decide, check markers, stage inputs, run the pipeline, write the marker,
//! upload the run directory.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::marker::{CompletionMarker, MARKER_FILES};
use super::types::{Notification, OrchestratorError, RunOutcome};
use crate::config::{ensure_slash, Config};
use crate::event::parse_and_decide;
use crate::pipeline::{CommandRunner, PipelineCoordinator, PipelineRequest, ToolRunner};
use crate::runid::{parse_run_id, COMPANION_FILE, TRIGGER_FILE};
use crate::storage::{object_key, GcsObjectStore, ObjectStore};
use crate::token::{create_token_provider, TokenProvider};
use crate::transport::RunContext;

/// The event handler: turns storage notifications into pipeline runs.
pub struct RunOrchestrator<R>
where
    R: ToolRunner + 'static,
{
    input_bucket: String,
    output_bucket: String,
    input_prefix: String,
    output_prefix: String,
    work_root: PathBuf,
    store: Arc<dyn ObjectStore>,
    tokens: Arc<dyn TokenProvider>,
    pipeline: Arc<PipelineCoordinator<R>>,
}

impl<R> RunOrchestrator<R>
where
    R: ToolRunner + 'static,
{
    /// Create a new orchestrator.
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        tokens: Arc<dyn TokenProvider>,
        pipeline: Arc<PipelineCoordinator<R>>,
    ) -> Self {
        Self {
            input_bucket: config.storage.input_bucket.trim().to_string(),
            output_bucket: config.storage.output_bucket.trim().to_string(),
            input_prefix: ensure_slash(&config.storage.input_prefix),
            output_prefix: ensure_slash(&config.storage.output_prefix),
            work_root: config.pipeline.work_root(),
            store,
            tokens,
            pipeline,
        }
    }

    /// Decodes a raw notification and processes it if it is a run trigger.
    pub async fn handle_event(
        &self,
        ctx: &RunContext,
        ce_type: &str,
        body: &[u8],
    ) -> Result<RunOutcome, OrchestratorError> {
        let (decision, object) = match parse_and_decide(ce_type, body, &self.input_bucket) {
            Ok(parsed) => parsed,
            Err(e) => {
                info!(error = %e, "event_contract_error");
                return Ok(RunOutcome::Malformed {
                    reason: e.to_string(),
                });
            }
        };

        if !decision.should_run {
            info!(reason = %decision.reason, "event_contract_ignore");
            return Ok(RunOutcome::Ignored {
                reason: decision.reason,
            });
        }

        let notification = Notification {
            event_type: decision.event_type,
            object_name: object.canonical_name().to_string(),
            bucket: object.bucket,
        };
        self.process(ctx, &notification).await
    }

    /// Processes a notification that already passed the event contract.
    pub async fn process(
        &self,
        ctx: &RunContext,
        notification: &Notification,
    ) -> Result<RunOutcome, OrchestratorError> {
        let Some(run_id) = parse_run_id(&notification.object_name, &self.input_prefix) else {
            debug!(object = %notification.object_name, "Not a run trigger");
            return Ok(RunOutcome::Ignored {
                reason: format!(
                    "object {} is not {}<run_id>/{}",
                    notification.object_name, self.input_prefix, TRIGGER_FILE
                ),
            });
        };
        ctx.check()?;

        // Removed on every exit path when dropped.
        tokio::fs::create_dir_all(&self.work_root)
            .await
            .map_err(OrchestratorError::Workspace)?;
        let workspace = tempfile::Builder::new()
            .prefix("finpipe-")
            .tempdir_in(&self.work_root)
            .map_err(OrchestratorError::Workspace)?;

        let token = self.tokens.token(ctx).await?;

        let output_root = format!("{}{}", self.output_prefix, run_id);
        for marker in MARKER_FILES {
            let key = object_key(&output_root, marker);
            if self
                .store
                .exists(ctx, &token, &self.output_bucket, &key)
                .await?
            {
                info!(%run_id, marker = %key, "Run already completed, skipping");
                return Ok(RunOutcome::DuplicateSkipped {
                    run_id,
                    marker: key,
                });
            }
        }

        let input_root = format!("{}{}", self.input_prefix, run_id);
        let left = workspace.path().join(COMPANION_FILE);
        let right = workspace.path().join(TRIGGER_FILE);
        for (name, dest) in [(COMPANION_FILE, &left), (TRIGGER_FILE, &right)] {
            let key = object_key(&input_root, name);
            self.store
                .download(ctx, &token, &self.input_bucket, &key, dest)
                .await?;
        }

        let request = PipelineRequest {
            left,
            right,
            out_base: workspace.path().join("out"),
            run_id: run_id.clone(),
            label: None,
        };
        let run = self.pipeline.run(ctx, &request).await?;

        let marker = CompletionMarker::from_outcome(run_id.clone(), &run.outcome);
        marker
            .write(&run.layout.run_dir)
            .await
            .map_err(|source| OrchestratorError::Marker {
                path: run.layout.run_dir.join(marker.file_name()),
                source,
            })?;

        let uploaded = self
            .store
            .upload_directory(ctx, &token, &self.output_bucket, &output_root, &run.layout.run_dir)
            .await?;

        match &marker.error {
            None => info!(%run_id, uploaded, "processed run ok"),
            Some(error) => warn!(%run_id, uploaded, %error, "processed run with error"),
        }

        Ok(RunOutcome::Completed {
            run_id,
            status: marker.status,
            error: marker.error,
            uploaded,
        })
    }
}

/// Wires the production collaborators: GCS over HTTPS, metadata or static
/// tokens, and tools run as subprocesses.
pub fn build_orchestrator(config: &Config, client: reqwest::Client) -> RunOrchestrator<CommandRunner> {
    let store = Arc::new(GcsObjectStore::new(
        client.clone(),
        &config.storage,
        &config.retry,
    ));
    let tokens = create_token_provider(&config.token, &config.retry, client);
    let pipeline = Arc::new(PipelineCoordinator::new(
        config.pipeline.clone(),
        CommandRunner::new(),
    ));
    RunOrchestrator::new(config, store, tokens, pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::MarkerStatus;
    use crate::runid::RunId;
    use crate::testing::fixtures::{
        notification_body, seed_inputs, test_config, INPUT_BUCKET, OUTPUT_BUCKET,
    };
    use crate::testing::{MockObjectStore, MockTokenProvider, MockToolRunner, StoreOp};
    use tempfile::TempDir;

    struct Harness {
        work: TempDir,
        store: MockObjectStore,
        tokens: MockTokenProvider,
        runner: MockToolRunner,
        orchestrator: RunOrchestrator<MockToolRunner>,
    }

    fn harness() -> Harness {
        let work = TempDir::new().unwrap();
        let config = test_config(work.path());
        let store = MockObjectStore::new();
        let tokens = MockTokenProvider::default();
        let runner = MockToolRunner::new();
        let orchestrator = RunOrchestrator::new(
            &config,
            Arc::new(store.clone()),
            Arc::new(tokens.clone()),
            Arc::new(PipelineCoordinator::new(config.pipeline.clone(), runner.clone())),
        );
        Harness {
            work,
            store,
            tokens,
            runner,
            orchestrator,
        }
    }

    async fn deliver(h: &Harness, name: &str) -> Result<RunOutcome, OrchestratorError> {
        h.orchestrator
            .handle_event(
                &RunContext::background(),
                "google.cloud.storage.object.v1.finalized",
                &notification_body(INPUT_BUCKET, name),
            )
            .await
    }

    #[tokio::test]
    async fn test_left_file_is_ignored_without_io() {
        let h = harness();
        let outcome = deliver(&h, "in/demo/left.csv").await.unwrap();

        assert!(matches!(outcome, RunOutcome::Ignored { .. }));
        assert_eq!(h.tokens.request_count(), 0);
        assert!(h.store.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_wrong_bucket_is_ignored() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_event(
                &RunContext::background(),
                "google.cloud.storage.object.v1.finalized",
                &notification_body("someone-else", "in/demo/right.csv"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.label(), "ignored");
    }

    #[tokio::test]
    async fn test_garbage_body_is_malformed() {
        let h = harness();
        let outcome = h
            .orchestrator
            .handle_event(&RunContext::background(), "", b"not json")
            .await
            .unwrap();
        assert!(matches!(outcome, RunOutcome::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_error_marker_also_suppresses_rerun() {
        let h = harness();
        seed_inputs(&h.store, INPUT_BUCKET, "in/", "demo").await;
        h.store
            .put_object(OUTPUT_BUCKET, "out/demo/_ERROR.json", "{}")
            .await;

        let outcome = deliver(&h, "in/demo/right.csv").await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::DuplicateSkipped {
                run_id: RunId::parse("demo").unwrap(),
                marker: "out/demo/_ERROR.json".to_string(),
            }
        );
        assert_eq!(
            h.store.calls_for(StoreOp::Exists).await,
            vec!["out/demo/_SUCCESS.json", "out/demo/_ERROR.json"]
        );
        assert!(h.runner.invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_recon_failure_is_acknowledged_with_error_marker() {
        let h = harness();
        seed_inputs(&h.store, INPUT_BUCKET, "in/", "demo").await;
        h.runner.fail_tool("recon", 1, "row 2: amount mismatch\n").await;

        let outcome = deliver(&h, "in/demo/right.csv").await.unwrap();

        match &outcome {
            RunOutcome::Completed { status, error, .. } => {
                assert_eq!(*status, MarkerStatus::Error);
                assert_eq!(
                    error.as_deref(),
                    Some("recon failed (pack still produced + verified). See tree/error.txt")
                );
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        let uploaded = h.store.list(OUTPUT_BUCKET, "out/demo/").await;
        assert!(uploaded.contains(&"out/demo/_ERROR.json".to_string()));
        assert!(uploaded.contains(&"out/demo/tree/error.txt".to_string()));
        assert!(uploaded.contains(&"out/demo/pack/manifest.json".to_string()));
        assert!(!uploaded.contains(&"out/demo/_SUCCESS.json".to_string()));
    }

    #[tokio::test]
    async fn test_token_failure_is_infrastructure_error() {
        let h = harness();
        h.tokens.set_failing(true);

        let err = deliver(&h, "in/demo/right.csv").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Credential(_)));
        assert!(!err.is_cancellation());
    }

    #[tokio::test]
    async fn test_missing_input_is_infrastructure_error() {
        let h = harness();
        h.store
            .put_object(INPUT_BUCKET, "in/demo/right.csv", "id\n")
            .await;

        let err = deliver(&h, "in/demo/right.csv").await.unwrap_err();
        match err {
            OrchestratorError::Storage(e) => assert_eq!(e.status_code(), Some(404)),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(h.runner.invocations().await.is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_is_infrastructure_error() {
        let h = harness();
        seed_inputs(&h.store, INPUT_BUCKET, "in/", "demo").await;
        h.store
            .fail_on(StoreOp::Upload, "out/demo/pack/manifest.json", 503)
            .await;

        let err = deliver(&h, "in/demo/right.csv").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Storage(_)));
        // Uploads run in key order: the marker sorts first and made it out.
        assert_eq!(
            h.store.calls_for(StoreOp::Upload).await,
            vec!["out/demo/_SUCCESS.json", "out/demo/pack/manifest.json"]
        );
    }

    #[tokio::test]
    async fn test_workspace_removed_after_run() {
        let h = harness();
        seed_inputs(&h.store, INPUT_BUCKET, "in/", "demo").await;

        deliver(&h, "in/demo/right.csv").await.unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(h.work.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_context_stops_before_work() {
        let h = harness();
        seed_inputs(&h.store, INPUT_BUCKET, "in/", "demo").await;
        let ctx = RunContext::background();
        ctx.cancel();

        let err = h
            .orchestrator
            .handle_event(
                &ctx,
                "finalized",
                &notification_body(INPUT_BUCKET, "in/demo/right.csv"),
            )
            .await
            .unwrap_err();
        assert!(err.is_cancellation());
        assert!(h.store.calls().await.is_empty());
    }
}
