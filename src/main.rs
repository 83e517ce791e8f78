//! # Vigil
//!
//! Entry point for the monitoring supervisor.
//!
//! `vigil run` re-reads the configuration file on every reconcile tick and
//! keeps one health check per enabled daemon kind running for each declared
//! cluster. Clusters removed from the file are torn down on the next tick;
//! Ctrl+C tears down everything.
//!
//! `vigil check` validates the file and prints the desired state it resolves
//! to, without starting anything.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::expect_used)]

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    commands::execute_command(cli.command).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
