//! Per-subject membership cache.
//!
//! The cache is a derived, read-optimised copy of store projections. It is
//! never authoritative: an absent or expired entry simply means "ask the
//! store". Entries are keyed by `{namespace}:{direction}.{subject_id}` so a
//! shared backend can host several isolated namespaces.
//!
//! # Module layout
//!
//! - [`CacheLayer`] — the trait the service talks to (this module).
//! - [`CacheKey`] — string key composition (this module).
//! - [`memory`] — in-process map with per-entry deadlines.
//! - [`sqlite`] — table-backed cache that survives restarts.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

use std::fmt;
use std::time::Duration;

use crate::error::ErrorCode;
use crate::model::{Direction, IdSet, UserId};

/// Namespace used when the configuration does not name one.
pub const DEFAULT_NAMESPACE: &str = "blocklist";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors returned by cache backends.
///
/// The service treats every variant as a miss on the read path.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backend cannot be reached.
    #[error("{}: {0}", ErrorCode::CacheUnavailable)]
    Unavailable(String),

    /// A SQLite-backed cache statement failed.
    #[error("{}: {context}: {source}", ErrorCode::CacheUnavailable)]
    Sqlite {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A stored payload could not be decoded back into an ID set.
    #[error("{}: entry {key} is corrupt: {source}", ErrorCode::CachePayloadCorrupt)]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Unavailable(_) | Self::Sqlite { .. } => ErrorCode::CacheUnavailable,
            Self::Corrupt { .. } => ErrorCode::CachePayloadCorrupt,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheKey
// ---------------------------------------------------------------------------

/// Address of one cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey<'a> {
    pub namespace: &'a str,
    pub direction: Direction,
    pub subject: UserId,
}

impl<'a> CacheKey<'a> {
    #[must_use]
    pub const fn new(namespace: &'a str, direction: Direction, subject: UserId) -> Self {
        Self {
            namespace,
            direction,
            subject,
        }
    }
}

impl fmt::Display for CacheKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.namespace, self.direction, self.subject)
    }
}

// ---------------------------------------------------------------------------
// CacheLayer
// ---------------------------------------------------------------------------

/// TTL-capable store of per-subject ID sets.
///
/// Readers must not exclude one another. Writers are serialized per key only
/// as far as the backend requires. `put` is last-write-wins.
pub trait CacheLayer: Send + Sync {
    /// The cached set, or `None` when missing or expired.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be read.
    fn get(&self, subject: UserId, direction: Direction) -> Result<Option<IdSet>, CacheError>;

    /// Overwrite the slot with `ids` and a fresh `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be written.
    fn put(
        &self,
        subject: UserId,
        direction: Direction,
        ids: &IdSet,
        ttl: Duration,
    ) -> Result<(), CacheError>;

    /// Drop the slot. Absent slots are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be written.
    fn invalidate(&self, subject: UserId, direction: Direction) -> Result<(), CacheError>;

    /// Whether an unexpired entry exists, without returning it.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be read.
    fn has(&self, subject: UserId, direction: Direction) -> Result<bool, CacheError> {
        Ok(self.get(subject, direction)?.is_some())
    }

    /// Membership of `member` in a live entry: `None` when there is no entry.
    ///
    /// Answers from a single read so the entry cannot expire between the
    /// presence check and the lookup.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the backend cannot be read.
    fn contains(
        &self,
        subject: UserId,
        direction: Direction,
        member: UserId,
    ) -> Result<Option<bool>, CacheError> {
        Ok(self
            .get(subject, direction)?
            .map(|ids| ids.contains(&member)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shape_is_namespace_direction_subject() {
        let key = CacheKey::new("blocklist", Direction::Blocking, UserId::new(42));
        assert_eq!(key.to_string(), "blocklist:blocking.42");
        let key = CacheKey::new("tenant-a", Direction::Blockers, UserId::new(7));
        assert_eq!(key.to_string(), "tenant-a:blockers.7");
    }

    #[test]
    fn error_codes_follow_variant() {
        assert_eq!(
            CacheError::Unavailable("down".into()).code(),
            ErrorCode::CacheUnavailable
        );
        let source = serde_json::from_str::<IdSet>("nope").expect_err("bad json");
        let err = CacheError::Corrupt {
            key: "k".into(),
            source,
        };
        assert_eq!(err.code(), ErrorCode::CachePayloadCorrupt);
        assert!(err.to_string().starts_with("E4002"));
    }
}
