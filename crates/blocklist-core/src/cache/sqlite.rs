//! SQLite table-backed TTL cache.
//!
//! Stands in for a network cache: entries outlive the process, several
//! processes can share one file, and payloads are stored as JSON arrays.
//! Expiry is compared against the wall clock in microseconds, so a
//! zero TTL entry is already expired when written.
//!
//! The cache may live in the same database file as
//! [`SqliteStore`](crate::store::SqliteStore); it uses its own connection and
//! its own table so the two never share a transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension, params};

use crate::cache::{CacheError, CacheKey, CacheLayer, DEFAULT_NAMESPACE};
use crate::model::{Direction, IdSet, UserId};
use crate::store::sqlite::configure_connection;

/// DDL for the cache table; safe to run repeatedly.
pub const CACHE_TABLE_SQL: &str = r"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    expires_at_us INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_entries_expiry
    ON cache_entries(expires_at_us);
";

/// Create the cache table if it does not exist yet.
///
/// # Errors
///
/// Returns an error if the DDL fails.
pub fn ensure_cache_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CACHE_TABLE_SQL)
}

/// Persistent cache on a dedicated SQLite connection.
#[derive(Debug)]
pub struct SqliteCache {
    namespace: String,
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open (or create) the cache table in the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the file cannot be opened or the table
    /// created.
    pub fn open(path: &Path, namespace: impl Into<String>) -> Result<Self, CacheError> {
        let conn = Connection::open(path).map_err(|e| sqlite_err("open cache database", e))?;
        configure_connection(&conn).map_err(|e| sqlite_err("configure pragmas", e))?;
        Self::from_connection(conn, namespace)
    }

    /// Private in-memory cache, mostly for tests.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory().map_err(|e| sqlite_err("open in-memory", e))?;
        Self::from_connection(conn, DEFAULT_NAMESPACE)
    }

    /// Wrap an existing connection, creating the cache table first.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the table cannot be created.
    pub fn from_connection(
        conn: Connection,
        namespace: impl Into<String>,
    ) -> Result<Self, CacheError> {
        ensure_cache_table(&conn).map_err(|e| sqlite_err("create cache table", e))?;
        Ok(Self {
            namespace: namespace.into(),
            conn: Mutex::new(conn),
        })
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Delete expired rows and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the delete fails.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = now_us();
        let purged = self.with_conn("purge expired entries", |conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE expires_at_us <= ?1",
                params![now],
            )
        })?;
        if purged > 0 {
            tracing::debug!(purged, namespace = %self.namespace, "purged expired cache rows");
        }
        Ok(purged)
    }

    fn key(&self, subject: UserId, direction: Direction) -> String {
        CacheKey::new(&self.namespace, direction, subject).to_string()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::Unavailable("sqlite cache lock poisoned".into()))
    }

    fn with_conn<T>(
        &self,
        context: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, CacheError> {
        let conn = self.lock()?;
        f(&conn).map_err(|source| sqlite_err(context, source))
    }
}

const fn sqlite_err(context: &'static str, source: rusqlite::Error) -> CacheError {
    CacheError::Sqlite { context, source }
}

fn now_us() -> i64 {
    chrono::Utc::now().timestamp_micros()
}

fn deadline_us(now: i64, ttl: Duration) -> i64 {
    i64::try_from(ttl.as_micros())
        .map_or(i64::MAX, |micros| now.saturating_add(micros))
}

impl CacheLayer for SqliteCache {
    fn get(&self, subject: UserId, direction: Direction) -> Result<Option<IdSet>, CacheError> {
        let key = self.key(subject, direction);
        let now = now_us();
        let payload: Option<String> = self.with_conn("read cache entry", |conn| {
            conn.prepare_cached(
                "SELECT payload FROM cache_entries WHERE key = ?1 AND expires_at_us > ?2",
            )?
            .query_row(params![key, now], |row| row.get(0))
            .optional()
        })?;

        payload
            .map(|json| {
                serde_json::from_str::<IdSet>(&json)
                    .map_err(|source| CacheError::Corrupt { key, source })
            })
            .transpose()
    }

    fn put(
        &self,
        subject: UserId,
        direction: Direction,
        ids: &IdSet,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = self.key(subject, direction);
        let payload = serde_json::to_string(ids).map_err(|source| CacheError::Corrupt {
            key: key.clone(),
            source,
        })?;
        let expires_at_us = deadline_us(now_us(), ttl);
        self.with_conn("write cache entry", |conn| {
            conn.prepare_cached(
                "INSERT INTO cache_entries (key, payload, expires_at_us) VALUES (?1, ?2, ?3) \
                 ON CONFLICT(key) DO UPDATE SET \
                     payload = excluded.payload, \
                     expires_at_us = excluded.expires_at_us",
            )?
            .execute(params![key, payload, expires_at_us])
        })?;
        Ok(())
    }

    fn invalidate(&self, subject: UserId, direction: Direction) -> Result<(), CacheError> {
        let key = self.key(subject, direction);
        self.with_conn("delete cache entry", |conn| {
            conn.prepare_cached("DELETE FROM cache_entries WHERE key = ?1")?
                .execute(params![key])
        })?;
        Ok(())
    }

    fn has(&self, subject: UserId, direction: Direction) -> Result<bool, CacheError> {
        let key = self.key(subject, direction);
        let now = now_us();
        self.with_conn("check cache entry", |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM cache_entries WHERE key = ?1 AND expires_at_us > ?2)",
                params![key, now],
                |row| row.get(0),
            )
        })
    }
}
