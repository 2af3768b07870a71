//! Server command - serve storage notifications over HTTP.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tokio::signal;
use tracing::info;

use finpipe_core::{build_orchestrator, load_config, validate_config};

use crate::api::create_router;
use crate::state::AppState;

/// Arguments for the server command.
#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Optional TOML config file.
    #[arg(long, env = "FINPIPE_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Execute the server command.
///
/// # Errors
///
/// Returns an error if the configuration is missing or invalid, the HTTP
/// client cannot be built, or the listener cannot be bound.
pub async fn execute(args: ServerArgs) -> Result<()> {
    match &args.config {
        Some(path) => info!("Loading configuration from {:?}", path),
        None => info!("No config file, using defaults and environment"),
    }
    let config = load_config(args.config.as_deref()).context("Failed to load config")?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!(
        input_bucket = %config.storage.input_bucket,
        output_bucket = %config.storage.output_bucket,
        input_prefix = %config.storage.input_prefix,
        output_prefix = %config.storage.output_prefix,
        "Configuration loaded successfully"
    );

    let client = reqwest::Client::builder()
        .user_agent(concat!("finpipe/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let orchestrator = Arc::new(build_orchestrator(&config, client));

    let addr = SocketAddr::new(config.server.host, config.server.port);
    let state = Arc::new(AppState::new(config, orchestrator));
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
