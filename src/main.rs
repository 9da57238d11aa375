//! plane-sync: write a Plane project's tasks into a Markdown report.

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use plane_sync::cli::Cli;
use plane_sync::config::{ConfigLoader, ConfigPaths};
use plane_sync::error::SyncError;
use plane_sync::logging::{LogTarget, init_logging};
use plane_sync::plane::PlaneClient;
use plane_sync::sync::{self, SyncOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(&LogTarget::from_str(&cli.log), cli.verbose) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    match run(&cli).await {
        Ok(outcome) => {
            if let Err(e) = print_outcome(&outcome, cli.json) {
                eprintln!("{}", SyncError::from(e).report());
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}", SyncError::from(e).report());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<SyncOutcome> {
    let project_dir = cli.project_dir.clone().unwrap_or_else(|| PathBuf::from("."));

    // Load configuration using tier merging
    let paths = ConfigPaths::discover(Some(project_dir.clone())).with_explicit(cli.config.clone());
    let loader = ConfigLoader::load(paths)?;
    for source in loader.sources() {
        debug!(path = %source.display(), "Config file");
    }
    loader.config().validate()?;
    let config = loader.into_config();

    info!(
        base_url = %config.plane.base_url,
        workspace = %config.plane.workspace_slug,
        project = %cli.project,
        "Starting sync"
    );

    let client = PlaneClient::from_config(&config)?;
    let outcome = sync::run(&config, &project_dir, &cli.to_request(), &client, Utc::now()).await?;
    Ok(outcome)
}

fn print_outcome(outcome: &SyncOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", outcome.to_text());
    }
    Ok(())
}
