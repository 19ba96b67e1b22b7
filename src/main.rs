// ABOUTME: Entry point for the relevo CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use relevo::commands;
use relevo::config::{self, Config};
use relevo::error::Result;
use std::env;
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => Config::load(path),
        None => {
            let cwd = env::current_dir()?;
            Config::discover(&cwd)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Init { force } => {
            let cwd = env::current_dir()?;
            config::init_config(&cwd, force)?;
            println!("wrote {}", config::CONFIG_FILENAME);
            Ok(0)
        }
        Commands::Deploy {
            service,
            image,
            count,
            force,
        } => {
            let config = load_config(config_path)?;
            commands::deploy(config, &service, &image, count, force).await
        }
        Commands::Status {
            deployment_id,
            json,
        } => {
            let config = load_config(config_path)?;
            commands::status(config, &deployment_id, json)
        }
        Commands::Cancel { deployment_id } => {
            let config = load_config(config_path)?;
            commands::cancel(config, &deployment_id)
        }
        Commands::List { json } => {
            let config = load_config(config_path)?;
            commands::list(config, json)
        }
    }
}
