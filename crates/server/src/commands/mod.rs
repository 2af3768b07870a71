//! Subcommand implementations.

pub mod run;
pub mod server;
