// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relevo")]
#[command(about = "Zero-downtime deployment orchestrator with health-gated rollout")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a config file (default: discover relevo.yml upward from cwd)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new relevo.yml configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Deploy a new image to a service
    Deploy {
        /// Service to deploy
        service: String,

        /// Image reference to roll out
        #[arg(long)]
        image: String,

        /// Desired task count
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,

        /// Break an existing deploy lock
        #[arg(long)]
        force: bool,
    },

    /// Show deployment status (exit 0 = completed, 1 = failed, 2 = in progress)
    Status {
        /// Deployment to inspect
        deployment_id: String,

        /// Emit the full record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Request rollback of a running deployment
    Cancel {
        /// Deployment to cancel
        deployment_id: String,
    },

    /// List recorded deployments
    List {
        /// Emit records as JSON
        #[arg(long)]
        json: bool,
    },
}
