// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Update Command
//!
//! This module implements the `sitestore update` command for applying
//! database migrations outside of service startup.
//!
//! # Architecture
//!
//! - **Layer:** CLI/Presentation
//! - **Purpose:** Database schema migration management
//! - **Integration:** CLI → SQLx Migrator → PostgreSQL
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! sitestore update
//!
//! # Preview migrations without applying
//! sitestore update --dry-run --migrations ./db/migrations
//! ```
//!
//! # Environment
//!
//! Requires `DATABASE_URL`. A `GCLOUD_SQL_INSTANCE` host is resolved the
//! same way the service resolves it.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sitestore_core::domain::settings::{EnvSettings, Settings, DATABASE_URL};
use sitestore_core::infrastructure::connection::ConnectionSpec;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashSet;
use std::path::PathBuf;

/// SQLSTATE for `undefined_table`
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,

    /// Directory holding the migration files
    #[arg(long, env = "SITESTORE_MIGRATIONS", default_value = "./migrations", value_name = "DIR")]
    migrations: PathBuf,
}

pub async fn execute(cmd: UpdateCommand) -> Result<()> {
    println!("{}", "sitestore update".bold().green());

    let settings = EnvSettings::new();
    let database_url = settings.get(DATABASE_URL);
    if database_url.is_empty() {
        anyhow::bail!("{DATABASE_URL} environment variable not set. Cannot run updates.");
    }

    let mut spec = ConnectionSpec::parse(&database_url).context("Invalid DATABASE_URL")?;
    spec.resolve_host(&settings);

    let migrator = Migrator::new(cmd.migrations.clone())
        .await
        .with_context(|| format!("Failed to load migrations from {}", cmd.migrations.display()))?;

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect_with(spec.connect_options()?)
        .await
        .context("Failed to connect to database")?;
    drop(spec);

    let applied = applied_versions(&pool).await?;

    let available: Vec<_> = migrator
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .collect();
    let pending: Vec<_> = available
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .collect();

    println!(
        "Migration status: {} applied, {} total available.",
        applied.len(),
        available.len()
    );

    if pending.is_empty() {
        println!("{}", "✓ Database is up to date.".green());
        pool.close().await;
        return Ok(());
    }

    if cmd.dry_run {
        println!("Pending migrations found (Dry Run):");
        for migration in &pending {
            println!(" - {} {}", migration.version, migration.description);
        }
        println!("Skipping application due to --dry-run");
        pool.close().await;
        return Ok(());
    }

    println!("Applying {} pending migrations...", pending.len());
    migrator.run(&pool).await.context("Failed to apply migrations")?;
    println!("{}", "✓ Database updated successfully.".green());

    pool.close().await;
    Ok(())
}

/// Versions recorded as applied; a database never migrated has none
async fn applied_versions(pool: &PgPool) -> Result<HashSet<i64>> {
    match sqlx::query_scalar::<_, i64>("SELECT version FROM _sqlx_migrations WHERE success")
        .fetch_all(pool)
        .await
    {
        Ok(versions) => Ok(versions.into_iter().collect()),
        Err(e) if is_undefined_table(&e) => Ok(HashSet::new()),
        Err(e) => Err(e).context("Failed to read applied migrations"),
    }
}

fn is_undefined_table(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(UNDEFINED_TABLE))
}
