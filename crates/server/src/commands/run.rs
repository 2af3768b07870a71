//! Run command - process two local CSVs without any cloud access.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use finpipe_core::{
    config::PipelineConfig, derive_run_id, CommandRunner, PipelineCoordinator, PipelineRequest,
    RunContext, RunId, RunLayout,
};

/// Overall deadline for an offline run.
pub const RUN_TIMEOUT: Duration = Duration::from_secs(120);

/// Arguments for the run command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to left.csv.
    #[arg(long)]
    pub left: PathBuf,

    /// Path to right.csv.
    #[arg(long)]
    pub right: PathBuf,

    /// Output base directory.
    #[arg(long, default_value = "./out")]
    pub out: PathBuf,

    /// Stable run id (default: sha256 of left then right, first 16 hex chars).
    #[arg(long, value_parser = parse_run_id_arg)]
    pub run_id: Option<RunId>,

    /// Path to the recon binary (or recon on PATH).
    #[arg(long, default_value = "recon")]
    pub recon: PathBuf,

    /// Path to the auditpack binary (or auditpack on PATH).
    #[arg(long, default_value = "auditpack")]
    pub auditpack: PathBuf,

    /// Pack label (default: job:<run-id>).
    #[arg(long)]
    pub label: Option<String>,
}

fn parse_run_id_arg(value: &str) -> Result<RunId, String> {
    RunId::parse(value).map_err(|e| e.to_string())
}

/// What the run command prints on stdout, whatever happened.
#[derive(Debug, Default)]
pub struct RunReport {
    pub run_id: String,
    pub layout: Option<RunLayout>,
}

impl RunReport {
    pub fn render(&self) -> String {
        let (run_dir, pack_dir) = match &self.layout {
            Some(layout) => (
                layout.run_dir.display().to_string(),
                layout.pack_dir.display().to_string(),
            ),
            None => (String::new(), String::new()),
        };
        format!(
            "run_id={}\nrun_dir={}\npack_dir={}\n",
            self.run_id, run_dir, pack_dir
        )
    }
}

/// Execute the run command.
///
/// The report is printed once the run id is known, even when the pipeline
/// fails; the returned error is the run's terminal error.
///
/// # Errors
///
/// Returns an error if the run id cannot be derived, the run directory cannot
/// be prepared, the deadline passes, or any tool fails.
pub async fn execute(args: RunArgs) -> Result<()> {
    let run_id = match args.run_id.clone() {
        Some(id) => id,
        None => derive_run_id(&args.left, &args.right)
            .await
            .context("compute run id")?,
    };

    let config = PipelineConfig {
        recon_bin: args.recon.clone(),
        auditpack_bin: args.auditpack.clone(),
        label: args.label.clone(),
        ..Default::default()
    };
    let coordinator = PipelineCoordinator::new(config, CommandRunner::new());
    let request = PipelineRequest {
        left: args.left,
        right: args.right,
        out_base: args.out,
        run_id: run_id.clone(),
        label: None,
    };

    info!(%run_id, "Starting offline run");
    let ctx = RunContext::background().with_timeout(RUN_TIMEOUT);
    let result = coordinator.run(&ctx, &request).await;

    let mut report = RunReport {
        run_id: run_id.to_string(),
        layout: None,
    };
    let outcome = match result {
        Ok(run) => {
            report.layout = Some(run.layout);
            run.outcome
        }
        Err(e) => Err(e),
    };
    print!("{}", report.render());

    outcome.map_err(anyhow::Error::from)
}
