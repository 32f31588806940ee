// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # sitestore CLI
//!
//! Operator entry point for the sitestore datastore.
//!
//! ## Commands
//!
//! - `sitestore check` - Bootstrap the pool and verify the database is live
//! - `sitestore update` - Apply pending schema migrations
//!
//! Connection settings come from the environment (`DATABASE_URL`,
//! `GCLOUD_SQL_INSTANCE`, `APP_ENV`); a `.env` file in the working
//! directory is loaded first when present.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;

/// sitestore - Multi-tenant datastore tooling
#[derive(Parser)]
#[command(name = "sitestore")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SITESTORE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Bootstrap the connection pool and report liveness
    #[command(name = "check")]
    Check {
        #[command(flatten)]
        command: commands::CheckCommand,
    },

    /// Update the sitestore database
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: commands::UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Commands::Check { command } => commands::check::execute(command).await,
        Commands::Update { command } => commands::update::execute(command).await,
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_dry_run() {
        let cli = Cli::try_parse_from(["sitestore", "update", "--dry-run", "--migrations", "db/migrations"]).unwrap();
        assert!(matches!(cli.command, Commands::Update { .. }));
    }

    #[test]
    fn test_check_ceiling_rejects_garbage() {
        assert!(Cli::try_parse_from(["sitestore", "check", "--ceiling", "soon"]).is_err());
        assert!(Cli::try_parse_from(["sitestore", "check", "--ceiling", "90s"]).is_ok());
    }
}
