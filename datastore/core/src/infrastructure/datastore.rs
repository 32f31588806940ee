// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Datastore Facade
//!
//! Process-wide handle aggregating the PostgreSQL pool with the cache,
//! settings, file storage and publisher collaborators. Construct once at
//! startup (usually behind an `Arc`) and share it with request handlers.
//!
//! Every statement run through the facade is reported to the [`DbLogger`]
//! synchronously after it completes: `Info` with `duration_ms` and `args`
//! on success, `Error` with an extra `error` field on failure.
//!
//! ```no_run
//! use sitestore_core::domain::settings::EnvSettings;
//! use sitestore_core::domain::tenant_scope::append_site_ulid;
//! use sitestore_core::infrastructure::bootstrap::BootstrapConfig;
//! use sitestore_core::infrastructure::datastore::Datastore;
//! use sitestore_core::sql_args;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Datastore::new(Arc::new(EnvSettings::new()), None, None, BootstrapConfig::default()).await?;
//! let (clause, args) = append_site_ulid("01HZX3K4", "status = $1 $SITEULID", sql_args!["live"])?;
//! let affected = store
//!     .execute(&format!("update page set archived = true where {clause}"), &args)
//!     .await?;
//! # let _ = affected;
//! store.close().await;
//! # Ok(())
//! # }
//! ```

use crate::domain::cache::Cache;
use crate::domain::file_storage::FileStorage;
use crate::domain::publisher::{PublishError, Publisher};
use crate::domain::settings::Settings;
use crate::domain::sql_arg::SqlArg;
use crate::domain::tenant_scope::{TenantScopeError, SITE_ULID_PLACEHOLDER};
use crate::infrastructure::bootstrap::{bootstrap, BootstrapConfig, BootstrapError};
use crate::infrastructure::db_log::{DbLogger, StatementLevel};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::migrate::MigrateError;
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Arguments, FromRow, Postgres, Transaction};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

/// Datastore errors
#[derive(Debug, Error)]
pub enum DatastoreError {
    #[error("Record not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Argument {position} could not be encoded: {message}")]
    Encode { position: usize, message: String },

    #[error("Unresolved tenant placeholder in statement: {0}")]
    UnresolvedTenantPlaceholder(String),

    #[error(transparent)]
    TenantScope(#[from] TenantScopeError),

    #[error("No publisher configured")]
    NoPublisher,

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("Datastore is closed")]
    Closed,
}

impl From<sqlx::Error> for DatastoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DatastoreError::NotFound,
            sqlx::Error::PoolClosed => DatastoreError::Closed,
            _ => DatastoreError::Database(err),
        }
    }
}

/// Snapshot of pool occupancy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub size: u32,
    pub idle: usize,
    pub closed: bool,
}

/// Shared handle over the pool and its collaborators.
///
/// The pool itself is not handed out, so every statement goes through the
/// facade's logging.
pub struct Datastore {
    pool: PgPool,
    cache: Option<Arc<dyn Cache>>,
    settings: Arc<dyn Settings>,
    file_storage: Option<Arc<dyn FileStorage>>,
    publisher: Option<Arc<dyn Publisher>>,
    logger: DbLogger,
    strict: bool,
    migration_error: Option<MigrateError>,
    closed: AtomicBool,
}

impl Datastore {
    /// Bootstrap the pool from `settings` and assemble the datastore
    pub async fn new(
        settings: Arc<dyn Settings>,
        cache: Option<Arc<dyn Cache>>,
        file_storage: Option<Arc<dyn FileStorage>>,
        config: BootstrapConfig,
    ) -> Result<Self, BootstrapError> {
        let ready = bootstrap(settings.as_ref(), cache, config).await?;
        Ok(Self {
            pool: ready.pool,
            cache: ready.cache,
            settings,
            file_storage,
            publisher: None,
            logger: ready.logger,
            strict: ready.strict,
            migration_error: ready.migration_error,
            closed: AtomicBool::new(false),
        })
    }

    /// Wrap an existing pool without running the bootstrap
    pub fn from_pool(pool: PgPool, settings: Arc<dyn Settings>) -> Self {
        Self {
            pool,
            cache: None,
            settings,
            file_storage: None,
            publisher: None,
            logger: DbLogger::default(),
            strict: false,
            migration_error: None,
            closed: AtomicBool::new(false),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_file_storage(mut self, file_storage: Arc<dyn FileStorage>) -> Self {
        self.file_storage = Some(file_storage);
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_logger(mut self, logger: DbLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Connection counts of the underlying pool
    pub fn pool_status(&self) -> PoolStatus {
        PoolStatus {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            closed: self.pool.is_closed(),
        }
    }

    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    pub fn settings(&self) -> &dyn Settings {
        self.settings.as_ref()
    }

    pub fn file_storage(&self) -> Option<&Arc<dyn FileStorage>> {
        self.file_storage.as_ref()
    }

    pub fn logger(&self) -> &DbLogger {
        &self.logger
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Migration failure from a production bootstrap, for the caller to judge
    pub fn migration_error(&self) -> Option<&MigrateError> {
        self.migration_error.as_ref()
    }

    /// Forward a change notification to the attached publisher
    pub async fn publish(
        &self,
        site_ulid: &str,
        entity: &str,
        message_type: &str,
        ids: &[String],
    ) -> Result<(), DatastoreError> {
        let publisher = self.publisher.as_ref().ok_or(DatastoreError::NoPublisher)?;
        publisher
            .publish(site_ulid, entity, message_type, ids)
            .await?;
        Ok(())
    }

    /// Fetch all rows as `T`
    pub async fn select<T>(&self, sql: &str, args: &[SqlArg]) -> Result<Vec<T>, DatastoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let arguments = self.prepare(sql, args)?;
        self.observe(
            sql,
            args,
            sqlx::query_as_with::<_, T, _>(sql, arguments).fetch_all(&self.pool),
        )
        .await
    }

    /// Fetch exactly one row as `T`; no row is [`DatastoreError::NotFound`]
    pub async fn one<T>(&self, sql: &str, args: &[SqlArg]) -> Result<T, DatastoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let arguments = self.prepare(sql, args)?;
        self.observe(
            sql,
            args,
            sqlx::query_as_with::<_, T, _>(sql, arguments).fetch_one(&self.pool),
        )
        .await
    }

    /// Run a statement and return the affected row count
    pub async fn execute(&self, sql: &str, args: &[SqlArg]) -> Result<u64, DatastoreError> {
        let arguments = self.prepare(sql, args)?;
        let result = self
            .observe(
                sql,
                args,
                sqlx::query_with(sql, arguments).execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected())
    }

    /// Start a transaction on a pooled connection.
    ///
    /// Statements, commit and rollback on the returned handle are reported
    /// through the same [`DbLogger`] as pool statements.
    pub async fn begin(&self) -> Result<DatastoreTransaction<'_>, DatastoreError> {
        let tx = self.observe("BEGIN", &[], self.pool.begin()).await?;
        Ok(DatastoreTransaction {
            store: self,
            tx: Some(tx),
        })
    }

    /// [`Datastore::select`] through the attached cache.
    ///
    /// Rows are cached as JSON under `key`. Cache failures are logged and
    /// never fail the query; without a cache this is a plain select.
    pub async fn select_cached<T>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        sql: &str,
        args: &[SqlArg],
    ) -> Result<Vec<T>, DatastoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Serialize + DeserializeOwned + Send + Unpin,
    {
        let Some(cache) = &self.cache else {
            return self.select(sql, args).await;
        };

        match cache.get_bytes(key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<Vec<T>>(&bytes) {
                Ok(rows) => {
                    self.logger.log(
                        StatementLevel::Debug,
                        sql,
                        [("cache", json!("hit")), ("key", json!(key))],
                    );
                    return Ok(rows);
                }
                Err(e) => warn!(key, error = %e, "Discarding undecodable cache entry"),
            },
            Ok(None) => {}
            Err(e) => error!(key, error = %e, "Cache read failed"),
        }

        let rows = self.select::<T>(sql, args).await?;
        match serde_json::to_vec(&rows) {
            Ok(bytes) => {
                if let Err(e) = cache.set_bytes(key, &bytes, ttl).await {
                    error!(key, error = %e, "Cache write failed");
                }
            }
            Err(e) => error!(key, error = %e, "Rows could not be cached"),
        }
        Ok(rows)
    }

    /// Close the pool. Only the first call closes; later calls return at once.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Cleanup");
        self.pool.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn prepare(&self, sql: &str, args: &[SqlArg]) -> Result<PgArguments, DatastoreError> {
        if self.strict && sql.contains(SITE_ULID_PLACEHOLDER) {
            return Err(DatastoreError::UnresolvedTenantPlaceholder(sql.to_string()));
        }
        bind_args(args)
    }

    async fn observe<R, F>(&self, sql: &str, args: &[SqlArg], query: F) -> Result<R, DatastoreError>
    where
        F: Future<Output = Result<R, sqlx::Error>>,
    {
        let started = Instant::now();
        let result = query.await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        let logged_args = Value::Array(args.iter().map(SqlArg::to_json).collect());

        match &result {
            Ok(_) | Err(sqlx::Error::RowNotFound) => self.logger.log(
                StatementLevel::Info,
                sql,
                [("duration_ms", json!(duration_ms)), ("args", logged_args)],
            ),
            Err(e) => self.logger.log(
                StatementLevel::Error,
                sql,
                [
                    ("duration_ms", json!(duration_ms)),
                    ("args", logged_args),
                    ("error", json!(e.to_string())),
                ],
            ),
        }

        result.map_err(DatastoreError::from)
    }
}

/// Open transaction obtained from [`Datastore::begin`].
///
/// Dropping it without [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) rolls back, and the rollback is still logged.
pub struct DatastoreTransaction<'a> {
    store: &'a Datastore,
    tx: Option<Transaction<'static, Postgres>>,
}

impl DatastoreTransaction<'_> {
    /// Run a statement and return the affected row count
    pub async fn execute(&mut self, sql: &str, args: &[SqlArg]) -> Result<u64, DatastoreError> {
        let arguments = self.store.prepare(sql, args)?;
        let tx = self.tx.as_mut().ok_or(DatastoreError::Closed)?;
        let result = self
            .store
            .observe(sql, args, sqlx::query_with(sql, arguments).execute(&mut **tx))
            .await?;
        Ok(result.rows_affected())
    }

    /// Fetch all rows as `T`
    pub async fn select<T>(&mut self, sql: &str, args: &[SqlArg]) -> Result<Vec<T>, DatastoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let arguments = self.store.prepare(sql, args)?;
        let tx = self.tx.as_mut().ok_or(DatastoreError::Closed)?;
        self.store
            .observe(
                sql,
                args,
                sqlx::query_as_with::<_, T, _>(sql, arguments).fetch_all(&mut **tx),
            )
            .await
    }

    /// Fetch exactly one row as `T`
    pub async fn one<T>(&mut self, sql: &str, args: &[SqlArg]) -> Result<T, DatastoreError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let arguments = self.store.prepare(sql, args)?;
        let tx = self.tx.as_mut().ok_or(DatastoreError::Closed)?;
        self.store
            .observe(
                sql,
                args,
                sqlx::query_as_with::<_, T, _>(sql, arguments).fetch_one(&mut **tx),
            )
            .await
    }

    pub async fn commit(mut self) -> Result<(), DatastoreError> {
        let tx = self.tx.take().ok_or(DatastoreError::Closed)?;
        self.store.observe("COMMIT", &[], tx.commit()).await
    }

    pub async fn rollback(mut self) -> Result<(), DatastoreError> {
        let tx = self.tx.take().ok_or(DatastoreError::Closed)?;
        self.store.observe("ROLLBACK", &[], tx.rollback()).await
    }
}

impl Drop for DatastoreTransaction<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            // sqlx queues the rollback on the connection; report it here
            self.store.logger.log(
                StatementLevel::Info,
                "ROLLBACK",
                [("implicit", json!(true))],
            );
        }
    }
}

/// Encode positional arguments in order
pub fn bind_args(args: &[SqlArg]) -> Result<PgArguments, DatastoreError> {
    let mut arguments = PgArguments::default();
    for (idx, arg) in args.iter().enumerate() {
        let added = match arg {
            SqlArg::Text(s) => arguments.add(s.clone()),
            SqlArg::Int(i) => arguments.add(*i),
            SqlArg::Float(f) => arguments.add(*f),
            SqlArg::Bool(b) => arguments.add(*b),
            SqlArg::Uuid(u) => arguments.add(*u),
            SqlArg::Timestamp(t) => arguments.add(*t),
            SqlArg::Json(v) => arguments.add(sqlx::types::Json(v.clone())),
            SqlArg::Null => arguments.add(Option::<String>::None),
        };
        added.map_err(|e| DatastoreError::Encode {
            position: idx + 1,
            message: e.to_string(),
        })?;
    }
    Ok(arguments)
}
