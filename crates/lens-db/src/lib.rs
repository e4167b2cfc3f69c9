//! # lens-db
//!
//! libSQL persistence for Sitelens.
//!
//! Holds sites, audit requests, and the append-only report history. Every
//! report gets a per-site version assigned inside a write transaction, so
//! versions are gapless and never reused. Reports and their source results
//! are immutable once written (enforced by triggers as well as the API).
//!
//! Uses the `libsql` crate (v0.9.29) for both local files and remote
//! Turso databases.

pub mod error;
pub mod helpers;
mod migrations;
pub mod repos;
pub mod retry;
pub mod service;

use std::future::Future;

use error::DatabaseError;
use lens_config::DatabaseConfig;
use libsql::Builder;
use libsql::params::IntoParams;
use retry::{RetryConfig, is_transient_error};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Central database handle.
///
/// All statements share one connection. A transaction on that connection is
/// visible to every caller until it commits, so the `gate` serializes writers
/// against each other and against readers.
pub struct LensDb {
    #[allow(dead_code)]
    db: libsql::Database,
    conn: libsql::Connection,
    gate: RwLock<()>,
    remote: bool,
    retry: RetryConfig,
}

impl LensDb {
    /// Open the database described by `config`: remote when a URL and token
    /// are set, local file otherwise.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        if config.is_remote() {
            Self::open_remote(&config.url, &config.auth_token).await
        } else {
            Self::open_local(&config.path).await
        }
    }

    /// Open a local-only database at the given path.
    ///
    /// Runs migrations automatically on first open.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database cannot be opened or
    /// migrations fail.
    pub async fn open_local(path: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;

        // Enable foreign keys (must be per-connection in SQLite)
        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .map_err(|e| DatabaseError::Migration(format!("PRAGMA foreign_keys: {e}")))?;

        let lens_db = Self {
            db,
            conn,
            gate: RwLock::new(()),
            remote: false,
            retry: RetryConfig::default(),
        };
        lens_db.run_migrations().await?;
        Ok(lens_db)
    }

    /// Open a remote libSQL database.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the connection or migrations fail.
    pub async fn open_remote(url: &str, auth_token: &str) -> Result<Self, DatabaseError> {
        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await?;
        let conn = db.connect()?;

        let lens_db = Self {
            db,
            conn,
            gate: RwLock::new(()),
            remote: true,
            retry: RetryConfig::default(),
        };
        lens_db.run_migrations().await?;
        tracing::info!(url, "connected to remote database");
        Ok(lens_db)
    }

    /// Access the underlying libSQL connection for direct queries.
    #[must_use]
    pub const fn conn(&self) -> &libsql::Connection {
        &self.conn
    }

    /// Whether this handle talks to a remote database.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        self.remote
    }

    /// Shared access for reads. Blocks while a writer holds the gate.
    pub async fn read_gate(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read().await
    }

    /// Exclusive access for writes and transactions.
    pub async fn write_gate(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    /// Generate a prefixed ID via libSQL. Returns e.g., `"rpt-a3f8b2c1"`.
    ///
    /// Uses `randomblob(4)` in SQL to produce 8-char hex, then prepends the prefix.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails or returns no rows.
    pub async fn generate_id(&self, prefix: &str) -> Result<String, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT '{prefix}-' || lower(hex(randomblob(4)))"),
                (),
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get::<String>(0)?)
    }

    /// Execute a statement, retrying transient remote errors.
    ///
    /// `params` is a closure because libSQL consumes parameters on each call.
    ///
    /// # Errors
    ///
    /// Returns the last `DatabaseError` once retries are exhausted, or
    /// immediately for non-transient errors.
    pub async fn execute_with<F, P>(&self, sql: &str, params: F) -> Result<u64, DatabaseError>
    where
        F: Fn() -> P,
        P: IntoParams,
    {
        self.with_retry(|| self.conn.execute(sql, params())).await
    }

    /// Run a query, retrying transient remote errors.
    ///
    /// # Errors
    ///
    /// Returns the last `DatabaseError` once retries are exhausted, or
    /// immediately for non-transient errors.
    pub async fn query_with<F, P>(&self, sql: &str, params: F) -> Result<libsql::Rows, DatabaseError>
    where
        F: Fn() -> P,
        P: IntoParams,
    {
        self.with_retry(|| self.conn.query(sql, params())).await
    }

    async fn with_retry<T, Fut>(&self, op: impl Fn() -> Fut) -> Result<T, DatabaseError>
    where
        Fut: Future<Output = Result<T, libsql::Error>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e)
                    if self.remote
                        && attempt < self.retry.max_attempts
                        && is_transient_error(&e) =>
                {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(attempt, ?delay, %e, "transient database error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Round-trip a trivial query.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the database does not answer.
    pub async fn ping(&self) -> Result<(), DatabaseError> {
        let _guard = self.read_gate().await;
        let mut rows = self.query_with("SELECT 1", || ()).await?;
        rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(())
    }
}
