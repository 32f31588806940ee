// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Connection Bootstrap
//!
//! One-shot startup sequence producing the shared `PgPool`:
//!
//! ```text
//! ParseConnectionString -> ResolveHost -> OpenHandle -> VerifyLive -> ConfigurePool -> MaybeMigrate -> Ready
//! ```
//!
//! - **ParseConnectionString**: `DATABASE_URL` setting. Unparsable is fatal.
//! - **ResolveHost**: `GCLOUD_SQL_INSTANCE` sentinel swapped for the setting.
//! - **OpenHandle**: lazy pool with driver statement logging off; the
//!   datastore's [`DbLogger`] is the single SQL log path.
//! - **VerifyLive**: ping with exponential backoff up to
//!   [`LivenessPolicy::max_elapsed`]. Exhaustion is fatal.
//! - **ConfigurePool**: fixed [`PoolLimits`]. sqlx takes limits at pool
//!   construction, so they are applied when the handle is opened.
//! - **MaybeMigrate**: production only, and only when a migrations directory
//!   is configured. Failures are logged and handed back in
//!   [`Bootstrapped::migration_error`]; the caller decides fatality.
//!
//! Fatal errors are returned as [`BootstrapError`]; the binary exits on them.
//! The call blocks until ready or exhausted and takes no cancellation token.
//! Wrap it in `tokio::time::timeout` for a watchdog.

use crate::domain::cache::Cache;
use crate::domain::settings::{Settings, DATABASE_URL};
use crate::infrastructure::connection::{ConnectionSpec, ConnectionSpecError};
use crate::infrastructure::db_log::{DbLogger, TraceLevel};
use serde_json::json;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Connection;
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info};

/// Fatal bootstrap failures
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Fatal database parse error: {0}")]
    InvalidConnectionString(#[from] ConnectionSpecError),

    #[error("Database not reachable after {attempts} attempts over {elapsed:?}: {last_error}")]
    LivenessExhausted {
        attempts: u32,
        elapsed: Duration,
        #[source]
        last_error: sqlx::Error,
    },
}

/// Exponential backoff for the startup liveness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Delay after the first failed ping
    pub initial_interval: Duration,
    /// Growth factor between delays
    pub multiplier: u32,
    /// Cap on a single delay
    pub max_interval: Duration,
    /// Give up once this much time has passed
    pub max_elapsed: Duration,
    /// Bound on a single ping, including connection establishment
    pub attempt_timeout: Duration,
}

impl Default for LivenessPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            multiplier: 2,
            max_interval: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(15 * 60),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

impl LivenessPolicy {
    /// Default policy with a different overall ceiling
    pub fn with_ceiling(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1).checked_pow(retry).unwrap_or(u32::MAX);
        self.initial_interval
            .checked_mul(factor)
            .unwrap_or(self.max_interval)
            .min(self.max_interval)
    }
}

/// Pool sizing; fixed operational defaults, not tuned per deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    /// Idle connections kept warm
    pub max_idle: u32,
    /// Hard cap on open connections
    pub max_open: u32,
    /// Idle connections above `max_idle` are closed after this long
    pub idle_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_idle: 4,
            max_open: 16,
            idle_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Explicit bootstrap switches (no process-wide flags)
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub liveness: LivenessPolicy,
    pub limits: PoolLimits,
    /// Migrations directory applied in production; `None` leaves schema
    /// management to an external tool
    pub migrations: Option<PathBuf>,
    /// Log every statement; errors are logged regardless
    pub sql_logging: bool,
    /// Refuse statements with an unresolved tenant placeholder.
    /// `None` means strict in development only.
    pub strict: Option<bool>,
    /// Log front-end; `sql_logging` is applied on top
    pub logger: DbLogger,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            liveness: LivenessPolicy::default(),
            limits: PoolLimits::default(),
            migrations: None,
            sql_logging: true,
            strict: None,
            logger: DbLogger::default(),
        }
    }
}

/// Output of a successful bootstrap
pub struct Bootstrapped {
    pub pool: PgPool,
    pub cache: Option<Arc<dyn Cache>>,
    pub logger: DbLogger,
    pub strict: bool,
    /// Set when production migrations were attempted and failed
    pub migration_error: Option<MigrateError>,
}

/// Run the bootstrap sequence against `DATABASE_URL`
pub async fn bootstrap(
    settings: &dyn Settings,
    cache: Option<Arc<dyn Cache>>,
    config: BootstrapConfig,
) -> Result<Bootstrapped, BootstrapError> {
    // ParseConnectionString
    let mut spec = ConnectionSpec::parse(&settings.get(DATABASE_URL)).map_err(|e| {
        error!(error = %e, "Fatal database parse error");
        e
    })?;
    if !spec.has_password() {
        error!("No database password");
    }

    // ResolveHost
    spec.resolve_host(settings);
    info!(
        db = %spec.database,
        user = %spec.username,
        host = %spec.host,
        "Connecting to database"
    );

    // OpenHandle + ConfigurePool
    let pool = open_pool(&spec, &config.limits, &config.liveness)?;
    drop(spec);

    let logger = config.logger.with_statements(config.sql_logging);

    // VerifyLive
    let attempts = verify_live(&pool, &config.liveness, &logger).await?;
    info!(attempts, "Database running");

    // MaybeMigrate
    let migration_error = maybe_migrate(&pool, settings, config.migrations.as_deref()).await;

    if cache.is_some() {
        debug!("Query cache attached");
    }

    let strict = config.strict.unwrap_or_else(|| settings.is_development());

    Ok(Bootstrapped {
        pool,
        cache,
        logger,
        strict,
        migration_error,
    })
}

/// Build the lazily-connecting pool with fixed limits
pub fn open_pool(
    spec: &ConnectionSpec,
    limits: &PoolLimits,
    liveness: &LivenessPolicy,
) -> Result<PgPool, BootstrapError> {
    let options = spec.connect_options()?;
    Ok(PgPoolOptions::new()
        .max_connections(limits.max_open)
        .min_connections(limits.max_idle.min(limits.max_open))
        .idle_timeout(Some(limits.idle_timeout))
        .acquire_timeout(liveness.attempt_timeout)
        .connect_lazy_with(options))
}

/// Ping until the database answers or the policy ceiling is reached.
///
/// Each ping is reported through `logger` as a driver trace event.
/// Returns the number of attempts taken.
pub async fn verify_live(
    pool: &PgPool,
    policy: &LivenessPolicy,
    logger: &DbLogger,
) -> Result<u32, BootstrapError> {
    let started = Instant::now();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let ping_started = Instant::now();
        let last_error = match tokio::time::timeout(policy.attempt_timeout, ping(pool)).await {
            Ok(Ok(())) => {
                logger.log(
                    TraceLevel::Debug,
                    "Ping",
                    [
                        ("attempt", json!(attempts)),
                        ("duration_ms", json!(ping_started.elapsed().as_millis() as u64)),
                    ],
                );
                return Ok(attempts);
            }
            Ok(Err(e)) => e,
            Err(_) => sqlx::Error::PoolTimedOut,
        };

        let elapsed = started.elapsed();
        let delay = policy.delay(attempts - 1);
        if elapsed + delay > policy.max_elapsed {
            error!(attempts, ?elapsed, error = %last_error, "Database liveness check exhausted");
            return Err(BootstrapError::LivenessExhausted {
                attempts,
                elapsed,
                last_error,
            });
        }

        logger.log(
            TraceLevel::Error,
            "Ping",
            [
                ("attempt", json!(attempts)),
                ("retry_in_ms", json!(delay.as_millis() as u64)),
                ("error", json!(last_error.to_string())),
            ],
        );
        tokio::time::sleep(delay).await;
    }
}

async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut conn = pool.acquire().await?;
    conn.ping().await
}

/// Apply migrations from `dir` when running in production.
///
/// Never fails the bootstrap; the error is returned for the caller to judge.
pub async fn maybe_migrate(
    pool: &PgPool,
    settings: &dyn Settings,
    dir: Option<&Path>,
) -> Option<MigrateError> {
    if !settings.is_production() {
        debug!("Not production, skipping migrations");
        return None;
    }
    let dir = dir?;

    info!(dir = %dir.display(), "Applying pending migrations");
    let result = match Migrator::new(dir.to_path_buf()).await {
        Ok(migrator) => migrator.run(pool).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => {
            info!("Migrations applied");
            None
        }
        Err(e) => {
            error!(error = %error_chain(&e), "Migration failed, continuing startup");
            Some(e)
        }
    }
}

/// Join an error and its sources into one line
pub(crate) fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::{EnvSettings, APP_ENV};

    fn fast_policy() -> LivenessPolicy {
        LivenessPolicy {
            initial_interval: Duration::from_millis(10),
            multiplier: 2,
            max_interval: Duration::from_millis(40),
            max_elapsed: Duration::from_millis(250),
            attempt_timeout: Duration::from_millis(200),
        }
    }

    fn lazy_pool() -> PgPool {
        let spec = ConnectionSpec::parse("postgres://app:pw@127.0.0.1:1/sites").unwrap();
        open_pool(&spec, &PoolLimits::default(), &fast_policy()).unwrap()
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let policy = LivenessPolicy::default();
        assert_eq!(policy.delay(0), Duration::from_millis(500));
        assert_eq!(policy.delay(1), Duration::from_secs(1));
        assert_eq!(policy.delay(3), Duration::from_secs(4));
        assert_eq!(policy.delay(10), Duration::from_secs(30));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn test_default_limits() {
        let limits = PoolLimits::default();
        assert_eq!(limits.max_idle, 4);
        assert_eq!(limits.max_open, 16);
    }

    #[tokio::test]
    async fn test_open_pool_applies_limits() {
        let pool = lazy_pool();
        let options = pool.options();
        assert_eq!(options.get_max_connections(), 16);
        assert_eq!(options.get_min_connections(), 4);
        assert_eq!(options.get_idle_timeout(), Some(Duration::from_secs(5 * 60)));
        assert_eq!(options.get_acquire_timeout(), fast_policy().attempt_timeout);
    }

    #[tokio::test]
    async fn test_open_pool_clamps_idle_to_open() {
        let spec = ConnectionSpec::parse("postgres://app:pw@127.0.0.1:1/sites").unwrap();
        let limits = PoolLimits {
            max_idle: 8,
            max_open: 2,
            ..PoolLimits::default()
        };
        let pool = open_pool(&spec, &limits, &fast_policy()).unwrap();
        assert_eq!(pool.options().get_max_connections(), 2);
        assert_eq!(pool.options().get_min_connections(), 2);
    }

    #[test]
    fn test_error_chain_joins_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = MigrateError::Source(Box::new(io));
        let chain = error_chain(&err);
        assert!(chain.contains("disk gone"), "{chain}");
    }

    #[tokio::test]
    async fn test_invalid_url_is_fatal() {
        let settings = EnvSettings::new().with_value(DATABASE_URL, "::nope::");
        let result = bootstrap(&settings, None, BootstrapConfig::default()).await;
        assert!(matches!(
            result,
            Err(BootstrapError::InvalidConnectionString(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_database_exhausts_within_ceiling() {
        let settings = EnvSettings::new()
            .with_value(DATABASE_URL, "postgres://app:pw@127.0.0.1:1/sites");
        let config = BootstrapConfig {
            liveness: fast_policy(),
            ..Default::default()
        };

        let started = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(10),
            bootstrap(&settings, None, config),
        )
        .await
        .expect("bootstrap must not hang");

        match result {
            Err(BootstrapError::LivenessExhausted { attempts, .. }) => assert!(attempts >= 1),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("nothing listens on port 1"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_missing_password_still_attempts_connection() {
        let settings =
            EnvSettings::new().with_value(DATABASE_URL, "postgres://app@127.0.0.1:1/sites");
        let config = BootstrapConfig {
            liveness: fast_policy(),
            ..Default::default()
        };

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            bootstrap(&settings, None, config),
        )
        .await
        .expect("bootstrap must not hang");

        assert!(
            matches!(result, Err(BootstrapError::LivenessExhausted { .. })),
            "password-less URL must reach the liveness check"
        );
    }

    #[tokio::test]
    async fn test_migrations_skipped_outside_production() {
        let pool = lazy_pool();
        let settings = EnvSettings::new().with_value(APP_ENV, "development");
        let result = maybe_migrate(&pool, &settings, Some(Path::new("/does/not/exist"))).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_migrations_skipped_without_directory() {
        let pool = lazy_pool();
        let settings = EnvSettings::new().with_value(APP_ENV, "production");
        assert!(maybe_migrate(&pool, &settings, None).await.is_none());
    }

    #[tokio::test]
    async fn test_migration_failure_is_returned_not_fatal() {
        let pool = lazy_pool();
        let settings = EnvSettings::new().with_value(APP_ENV, "production");
        let missing = tempfile::tempdir().unwrap().path().join("missing");
        let result = maybe_migrate(&pool, &settings, Some(&missing)).await;
        assert!(result.is_some());
    }
}
