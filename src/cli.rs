//! CLI command definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Vigil - storage cluster monitoring supervisor
#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(version)]
#[command(about = "Keeps Ceph daemon health checks in step with the declared cluster spec")]
#[command(
    long_about = "Vigil supervises one health check per daemon kind (mon, osd, status) for every declared cluster, starting and stopping them as the configuration changes."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Supervise the declared clusters until Ctrl+C
    Run {
        /// Configuration file path
        #[arg(short, long, default_value = "vigil.toml")]
        config: PathBuf,

        /// Override the reconcile interval (seconds)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Validate a configuration file and print the resolved desired state
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "vigil.toml")]
        config: PathBuf,
    },
}
