// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Check Command
//!
//! `sitestore check` runs the same bootstrap a service performs at startup
//! (parse, host resolution, liveness with backoff) and reports the pool.
//! Exits non-zero when the bootstrap fails.
//!
//! ```bash
//! sitestore check --ceiling 2m
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sitestore_core::domain::settings::EnvSettings;
use sitestore_core::infrastructure::bootstrap::{BootstrapConfig, LivenessPolicy};
use sitestore_core::Datastore;
use std::sync::Arc;
use std::time::Duration;

#[derive(Args)]
pub struct CheckCommand {
    /// Give up on the liveness check after this long (e.g. "30s", "15m")
    #[arg(long, value_parser = humantime::parse_duration, default_value = "15m")]
    ceiling: Duration,

    /// Only log failed statements
    #[arg(long)]
    no_sql_log: bool,
}

pub async fn execute(cmd: CheckCommand) -> Result<()> {
    println!("{}", "sitestore check".bold().green());

    let settings = Arc::new(EnvSettings::new());
    println!("Environment: {:?}", settings.environment());

    let config = BootstrapConfig {
        liveness: LivenessPolicy::with_ceiling(cmd.ceiling),
        sql_logging: !cmd.no_sql_log,
        ..BootstrapConfig::default()
    };

    let store = Datastore::new(settings, None, None, config)
        .await
        .context("Database bootstrap failed")?;

    let pool = store.pool_status();
    println!(
        "Pool: {} open, {} idle, strict mode {}",
        pool.size,
        pool.idle,
        if store.is_strict() { "on" } else { "off" }
    );
    println!("{}", "✓ Database is live.".green());

    store.close().await;
    Ok(())
}
