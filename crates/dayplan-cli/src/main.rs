//! dayplan CLI - daily todos, long-term plans and notes from the terminal
//!
//! Works against the local data file and reconciles it with the cloud
//! backend on `dayplan sync` once a Supabase project is configured.

mod auth;
mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use dayplan_core::config::AppConfig;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::open_planner;
use crate::commands::completions::run_completions;
use crate::commands::note::run_note;
use crate::commands::plan::run_plan;
use crate::commands::sync::run_sync_command;
use crate::commands::todo::run_todo;
use crate::error::CliError;

const DEFAULT_LOG_DIRECTIVE: &str = "dayplan=info";

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_DIRECTIVE));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let mut config = AppConfig::load()?;
    if let Some(path) = cli.data_path {
        config.data_path = Some(path);
    }

    match cli.command {
        Commands::Todo { command } => run_todo(command, &open_planner(&config)?)?,
        Commands::Plan { command } => run_plan(command, &open_planner(&config)?)?,
        Commands::Note { command } => run_note(command, &open_planner(&config)?)?,
        Commands::Sync { command } => run_sync_command(command, &config).await?,
        Commands::Auth { command } => run_auth(command, &config).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
