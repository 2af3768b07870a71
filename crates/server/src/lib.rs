//! # finpipe-server
//!
//! HTTP front end and command-line entrypoint for the reconciliation pipeline.
//!
//! ## Commands
//!
//! - `finpipe run` - Run recon + auditpack on two local CSVs
//! - `finpipe server` - Serve storage notifications (`POST /`)
//!
//! ## Configuration
//!
//! The server reads an optional TOML file (`--config` or `FINPIPE_CONFIG`),
//! `FINPIPE_`-prefixed variables and the flat deployment variables
//! (`INPUT_BUCKET`, `OUTPUT_BUCKET`, `PORT`, ...).

pub mod api;
pub mod commands;
pub mod metrics;
pub mod state;

use clap::{Parser, Subcommand};

/// finpipe - event-triggered reconciliation pipeline.
#[derive(Debug, Parser)]
#[command(name = "finpipe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run recon + auditpack on two CSVs.
    Run(commands::run::RunArgs),
    /// Serve storage notifications over HTTP.
    Server(commands::server::ServerArgs),
}
