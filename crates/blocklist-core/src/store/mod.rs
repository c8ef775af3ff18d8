//! Authoritative relationship store.
//!
//! The store holds the set of directed `(blocker, blocked)` edges. It is the
//! only source of truth; every cached ID set must be traceable back to one of
//! the projections below.
//!
//! ## Adapters
//!
//! - [`sqlite`] — embedded SQLite with versioned migrations (WAL, busy
//!   timeout). Used by the CLI and for durable deployments.
//! - [`memory`] — ordered in-process edge log, for tests and ephemeral use.
//!
//! Both adapters guarantee that `insert`, `remove` and `exists` are atomic with
//! respect to one another at the level of a single edge, and that listings are
//! returned in insertion order.

pub mod memory;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::ErrorCode;
use crate::model::{BlockRecord, Edge, Page, PageRequest, UserId};

/// Errors raised by a [`RelationshipStore`].
///
/// Every variant is fatal to the calling operation and is propagated to the
/// caller of the service unmodified. Nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQLite engine rejected or failed a statement.
    #[error("{}: {context}: {source}", ErrorCode::StorageUnavailable)]
    Sqlite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// The backing store cannot be reached or a write could not be confirmed.
    #[error("{}: {0}", ErrorCode::StorageUnavailable)]
    Unavailable(String),

    /// The on-disk schema could not be brought to the supported version.
    #[error("{}: schema migration failed: {source}", ErrorCode::SchemaMigrationFailed)]
    Migration {
        #[source]
        source: rusqlite::Error,
    },

    /// The database was written by a newer schema than this build knows.
    #[error(
        "{}: schema version {found} is newer than supported version {supported}",
        ErrorCode::SchemaMigrationFailed
    )]
    SchemaTooNew { found: u32, supported: u32 },
}

impl StoreError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Sqlite { .. } | Self::Unavailable(_) => ErrorCode::StorageUnavailable,
            Self::Migration { .. } | Self::SchemaTooNew { .. } => {
                ErrorCode::SchemaMigrationFailed
            }
        }
    }

    pub(crate) const fn sqlite(context: &'static str, source: rusqlite::Error) -> Self {
        Self::Sqlite { context, source }
    }
}

/// Durable set of directed block edges.
///
/// Implementations must be safe to share across threads. Operations block the
/// calling thread for at most the backend's own timeout policy.
pub trait RelationshipStore: Send + Sync {
    /// `true` iff the edge `blocker -> blocked` is present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn exists(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError>;

    /// Insert the edge if absent. Returns `true` only when a new edge was
    /// created; self-edges and duplicates return `false`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write cannot be confirmed.
    fn insert(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError>;

    /// Delete the edge if present. Returns `true` only when a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the write cannot be confirmed.
    fn remove(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError>;

    /// Every identity `subject` blocks, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn list_out_edges(&self, subject: UserId) -> Result<Vec<UserId>, StoreError>;

    /// Every identity that blocks `subject`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn list_in_edges(&self, subject: UserId) -> Result<Vec<UserId>, StoreError>;

    /// One page of [`list_out_edges`](Self::list_out_edges).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn page_out_edges(&self, subject: UserId, request: PageRequest) -> Result<Page, StoreError>;

    /// One page of [`list_in_edges`](Self::list_in_edges).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn page_in_edges(&self, subject: UserId, request: PageRequest) -> Result<Page, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn count_out_edges(&self, subject: UserId) -> Result<u64, StoreError>;

    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn count_in_edges(&self, subject: UserId) -> Result<u64, StoreError>;

    /// Full records for the edges `subject` owns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn out_records(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError>;

    /// Full records for the edges pointing at `subject`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn in_records(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError>;

    /// Every edge with `subject` at either end, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn edges_touching(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError>;

    /// The subset of `{a -> b, b -> a}` that exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backend cannot be read.
    fn find_edges_involving(&self, a: UserId, b: UserId) -> Result<Vec<Edge>, StoreError> {
        let mut edges = Vec::with_capacity(2);
        if self.exists(a, b)? {
            edges.push(Edge::new(a, b));
        }
        if a != b && self.exists(b, a)? {
            edges.push(Edge::new(b, a));
        }
        Ok(edges)
    }
}
