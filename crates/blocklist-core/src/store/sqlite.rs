//! SQLite-backed relationship store.
//!
//! Runtime defaults match a single-writer embedded deployment:
//! - `journal_mode = WAL` so readers in other processes are not blocked
//! - `busy_timeout = 5s` to absorb transient lock contention
//! - `foreign_keys = ON` and `synchronous = NORMAL`
//!
//! The connection sits behind a [`Mutex`]; every trait method runs exactly one
//! statement, so each edge mutation is atomic relative to any existence check.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::model::{BlockRecord, Edge, Page, PageRequest, PageToken, UserId};
use crate::store::migrations::{self, LATEST_SCHEMA_VERSION};
use crate::store::{RelationshipStore, StoreError};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

impl ToSql for UserId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let raw = i64::try_from(self.get())
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
        Ok(ToSqlOutput::from(raw))
    }
}

impl FromSql for UserId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = i64::column_result(value)?;
        u64::try_from(raw)
            .map(Self::new)
            .map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

/// Durable edge store on a single SQLite connection.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`, apply runtime pragmas, and
    /// migrate the schema to the latest version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be opened, configured, or
    /// migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|error| {
                StoreError::Unavailable(format!(
                    "create store directory {}: {error}",
                    parent.display()
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(|e| StoreError::sqlite("open database", e))?;
        configure_connection(&conn).map_err(|e| StoreError::sqlite("configure pragmas", e))?;
        tracing::debug!(path = %path.display(), "opened relationship store");
        Self::from_connection(conn)
    }

    /// Open a private in-memory database. Useful for tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::sqlite("open in-memory", e))?;
        Self::from_connection(conn)
    }

    /// Wrap an existing connection, migrating it first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaTooNew`] if the database is ahead of this
    /// build, or [`StoreError::Migration`] if a migration fails.
    pub fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        let found = migrations::current_schema_version(&conn)
            .map_err(|source| StoreError::Migration { source })?;
        if found > LATEST_SCHEMA_VERSION {
            return Err(StoreError::SchemaTooNew {
                found,
                supported: LATEST_SCHEMA_VERSION,
            });
        }
        migrations::migrate(&mut conn).map_err(|source| StoreError::Migration { source })?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` against the locked connection and tag failures with `context`.
    fn with_conn<T>(
        &self,
        context: &'static str,
        f: impl FnOnce(&Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let conn = self.lock()?;
        f(&conn).map_err(|source| StoreError::sqlite(context, source))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection lock poisoned".into()))
    }

    fn collect_ids(
        &self,
        context: &'static str,
        sql: &str,
        subject: UserId,
    ) -> Result<Vec<UserId>, StoreError> {
        self.with_conn(context, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params![subject], |row| row.get::<_, UserId>(0))?;
            rows.collect()
        })
    }

    fn collect_records(
        &self,
        context: &'static str,
        sql: &str,
        subject: UserId,
    ) -> Result<Vec<BlockRecord>, StoreError> {
        self.with_conn(context, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params![subject], row_to_record)?;
            rows.collect()
        })
    }

    fn page(
        &self,
        context: &'static str,
        sql: &str,
        subject: UserId,
        request: PageRequest,
    ) -> Result<Page, StoreError> {
        let after = request.after.map_or(0, PageToken::sequence);
        let size = request.effective_size();
        // One extra row tells us whether another page exists.
        let fetch = i64::try_from(size).unwrap_or(i64::MAX).saturating_add(1);

        let mut rows: Vec<(i64, UserId)> = self.with_conn(context, |conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(params![subject, after, fetch], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, UserId>(1)?))
            })?;
            rows.collect()
        })?;

        let has_more = rows.len() > size;
        rows.truncate(size);
        let next = if has_more {
            rows.last().map(|(seq, _)| PageToken(*seq))
        } else {
            None
        };
        Ok(Page {
            ids: rows.into_iter().map(|(_, id)| id).collect(),
            next,
        })
    }

    fn count(&self, context: &'static str, sql: &str, subject: UserId) -> Result<u64, StoreError> {
        let count: i64 = self.with_conn(context, |conn| {
            conn.query_row(sql, params![subject], |row| row.get(0))
        })?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

pub(crate) fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<BlockRecord> {
    Ok(BlockRecord {
        edge: Edge::new(row.get(0)?, row.get(1)?),
        created_at_us: row.get(2)?,
    })
}

impl RelationshipStore for SqliteStore {
    fn exists(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        self.with_conn("check edge exists", |conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2)",
                params![blocker, blocked],
                |row| row.get(0),
            )
        })
    }

    fn insert(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        if blocker == blocked {
            return Ok(false);
        }
        let now = chrono::Utc::now().timestamp_micros();
        let changed = self.with_conn("insert edge", |conn| {
            conn.prepare_cached(
                "INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at_us) \
                 VALUES (?1, ?2, ?3)",
            )?
            .execute(params![blocker, blocked, now])
        })?;
        Ok(changed == 1)
    }

    fn remove(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        let changed = self.with_conn("remove edge", |conn| {
            conn.prepare_cached("DELETE FROM blocks WHERE blocker_id = ?1 AND blocked_id = ?2")?
                .execute(params![blocker, blocked])
        })?;
        Ok(changed == 1)
    }

    fn list_out_edges(&self, subject: UserId) -> Result<Vec<UserId>, StoreError> {
        self.collect_ids(
            "list out edges",
            "SELECT blocked_id FROM blocks WHERE blocker_id = ?1 ORDER BY seq",
            subject,
        )
    }

    fn list_in_edges(&self, subject: UserId) -> Result<Vec<UserId>, StoreError> {
        self.collect_ids(
            "list in edges",
            "SELECT blocker_id FROM blocks WHERE blocked_id = ?1 ORDER BY seq",
            subject,
        )
    }

    fn page_out_edges(&self, subject: UserId, request: PageRequest) -> Result<Page, StoreError> {
        self.page(
            "page out edges",
            "SELECT seq, blocked_id FROM blocks \
             WHERE blocker_id = ?1 AND seq > ?2 ORDER BY seq LIMIT ?3",
            subject,
            request,
        )
    }

    fn page_in_edges(&self, subject: UserId, request: PageRequest) -> Result<Page, StoreError> {
        self.page(
            "page in edges",
            "SELECT seq, blocker_id FROM blocks \
             WHERE blocked_id = ?1 AND seq > ?2 ORDER BY seq LIMIT ?3",
            subject,
            request,
        )
    }

    fn count_out_edges(&self, subject: UserId) -> Result<u64, StoreError> {
        self.count(
            "count out edges",
            "SELECT COUNT(*) FROM blocks WHERE blocker_id = ?1",
            subject,
        )
    }

    fn count_in_edges(&self, subject: UserId) -> Result<u64, StoreError> {
        self.count(
            "count in edges",
            "SELECT COUNT(*) FROM blocks WHERE blocked_id = ?1",
            subject,
        )
    }

    fn out_records(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError> {
        self.collect_records(
            "list out records",
            "SELECT blocker_id, blocked_id, created_at_us FROM blocks \
             WHERE blocker_id = ?1 ORDER BY seq",
            subject,
        )
    }

    fn in_records(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError> {
        self.collect_records(
            "list in records",
            "SELECT blocker_id, blocked_id, created_at_us FROM blocks \
             WHERE blocked_id = ?1 ORDER BY seq",
            subject,
        )
    }

    fn edges_touching(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError> {
        self.collect_records(
            "list touching edges",
            "SELECT blocker_id, blocked_id, created_at_us FROM blocks \
             WHERE blocker_id = ?1 OR blocked_id = ?1 ORDER BY seq",
            subject,
        )
    }

    fn find_edges_involving(&self, a: UserId, b: UserId) -> Result<Vec<Edge>, StoreError> {
        self.with_conn("find edges involving pair", |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT blocker_id, blocked_id FROM blocks \
                 WHERE (blocker_id = ?1 AND blocked_id = ?2) \
                    OR (blocker_id = ?2 AND blocked_id = ?1) \
                 ORDER BY CASE WHEN blocker_id = ?1 THEN 0 ELSE 1 END",
            )?;
            let rows = stmt.query_map(params![a, b], |row| {
                Ok(Edge::new(row.get(0)?, row.get(1)?))
            })?;
            rows.collect()
        })
    }
}

/// Schema version the open database is at.
///
/// # Errors
///
/// Returns [`StoreError`] if the pragma cannot be read.
pub fn store_schema_version(store: &SqliteStore) -> Result<u32, StoreError> {
    store.with_conn("read schema version", migrations::current_schema_version)
}

/// Read the creation timestamp recorded in `store_meta`, if present.
///
/// # Errors
///
/// Returns [`StoreError`] if the metadata row cannot be read.
pub fn store_created_at_us(store: &SqliteStore) -> Result<Option<i64>, StoreError> {
    store.with_conn("read store metadata", |conn| {
        conn.query_row(
            "SELECT created_at_us FROM store_meta WHERE id = 1",
            [],
            |row| row.get(0),
        )
        .optional()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn uid(raw: u64) -> UserId {
        UserId::new(raw)
    }

    fn temp_db_path() -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("blocklist.sqlite3");
        (dir, path)
    }

    #[test]
    fn open_sets_wal_busy_timeout_and_fk() {
        let (_dir, path) = temp_db_path();
        let store = SqliteStore::open(&path).expect("open store");

        let (journal_mode, busy_timeout_ms, foreign_keys) = store
            .with_conn("pragmas", |conn| {
                let journal: String =
                    conn.pragma_query_value(None, "journal_mode", |row| row.get(0))?;
                let busy: u64 = conn.pragma_query_value(None, "busy_timeout", |row| row.get(0))?;
                let fk: i64 = conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?;
                Ok((journal, busy, fk))
            })
            .expect("query pragmas");

        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");
        assert_eq!(u128::from(busy_timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());
        assert_eq!(foreign_keys, 1);
        assert!(store_created_at_us(&store).expect("meta").is_some());
        assert_eq!(
            store_schema_version(&store).expect("version"),
            LATEST_SCHEMA_VERSION
        );
    }

    #[test]
    fn edges_survive_reopen() {
        let (_dir, path) = temp_db_path();
        {
            let store = SqliteStore::open(&path).expect("open store");
            assert!(store.insert(uid(1), uid(2)).expect("insert"));
        }
        let store = SqliteStore::open(&path).expect("reopen store");
        assert!(store.exists(uid(1), uid(2)).expect("exists"));
        assert_eq!(store.list_out_edges(uid(1)).expect("list"), vec![uid(2)]);
    }

    #[test]
    fn insert_and_remove_report_row_changes() {
        let store = SqliteStore::open_in_memory().expect("open");
        assert!(store.insert(uid(1), uid(2)).expect("insert"));
        assert!(!store.insert(uid(1), uid(2)).expect("duplicate insert"));
        assert!(!store.insert(uid(4), uid(4)).expect("self edge"));
        assert!(store.remove(uid(1), uid(2)).expect("remove"));
        assert!(!store.remove(uid(1), uid(2)).expect("second remove"));
    }

    #[test]
    fn listings_counts_and_records() {
        let store = SqliteStore::open_in_memory().expect("open");
        for target in [8, 2, 5] {
            store.insert(uid(1), uid(target)).expect("insert");
        }
        store.insert(uid(3), uid(1)).expect("insert");

        assert_eq!(
            store.list_out_edges(uid(1)).expect("out"),
            vec![uid(8), uid(2), uid(5)]
        );
        assert_eq!(store.list_in_edges(uid(1)).expect("in"), vec![uid(3)]);
        assert_eq!(store.count_out_edges(uid(1)).expect("count out"), 3);
        assert_eq!(store.count_in_edges(uid(1)).expect("count in"), 1);

        let records = store.out_records(uid(1)).expect("records");
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.created_at_us > 0));
        assert_eq!(store.in_records(uid(1)).expect("in records")[0].edge.blocker, uid(3));
        assert_eq!(store.edges_touching(uid(1)).expect("touching").len(), 4);
    }

    #[test]
    fn pagination_is_keyset_and_stable() {
        let store = SqliteStore::open_in_memory().expect("open");
        for target in 2..=6 {
            store.insert(uid(1), uid(target)).expect("insert");
        }

        let first = store.page_out_edges(uid(1), PageRequest::first(2)).expect("page 1");
        assert_eq!(first.ids, vec![uid(2), uid(3)]);
        let token = first.next.expect("more pages");

        // Removing an already-returned edge must not shift the next page.
        store.remove(uid(1), uid(2)).expect("remove");

        let second = store
            .page_out_edges(uid(1), PageRequest::after(token, 2))
            .expect("page 2");
        assert_eq!(second.ids, vec![uid(4), uid(5)]);

        let third = store
            .page_out_edges(uid(1), PageRequest::after(second.next.expect("token"), 2))
            .expect("page 3");
        assert_eq!(third.ids, vec![uid(6)]);
        assert_eq!(third.next, None);
    }

    #[test]
    fn page_in_edges_walks_blockers() {
        let store = SqliteStore::open_in_memory().expect("open");
        for blocker in [4, 7, 9] {
            store.insert(uid(blocker), uid(1)).expect("insert");
        }
        let page = store.page_in_edges(uid(1), PageRequest::first(10)).expect("page");
        assert_eq!(page.ids, vec![uid(4), uid(7), uid(9)]);
        assert_eq!(page.next, None);
    }

    #[test]
    fn find_edges_involving_orders_forward_edge_first() {
        let store = SqliteStore::open_in_memory().expect("open");
        store.insert(uid(2), uid(1)).expect("insert");
        store.insert(uid(1), uid(2)).expect("insert");
        store.insert(uid(1), uid(3)).expect("noise");

        assert_eq!(
            store.find_edges_involving(uid(1), uid(2)).expect("find"),
            vec![Edge::new(uid(1), uid(2)), Edge::new(uid(2), uid(1))]
        );
        assert!(store.find_edges_involving(uid(5), uid(6)).expect("none").is_empty());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().expect("open");
        conn.pragma_update(None, "user_version", 99_i64).expect("bump version");
        let err = SqliteStore::from_connection(conn).expect_err("too new");
        assert!(matches!(err, StoreError::SchemaTooNew { found: 99, .. }));
    }
}
