//! In-process TTL cache.
//!
//! Entries live in a `HashMap` keyed by the rendered [`CacheKey`] behind an
//! [`RwLock`]: `get`/`has`/`contains` share the read lock, `put`/`invalidate`
//! take the write lock. Expired entries read as absent and are dropped on the
//! next write to the same key or by [`MemoryCache::purge_expired`].

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use crate::cache::{CacheError, CacheKey, CacheLayer, DEFAULT_NAMESPACE};
use crate::model::{Direction, IdSet, UserId};

#[derive(Debug, Clone)]
struct Entry {
    ids: IdSet,
    /// `None` when the TTL overflowed `Instant`; such entries never expire.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// Process-local cache.
#[derive(Debug)]
pub struct MemoryCache {
    namespace: String,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl MemoryCache {
    #[must_use]
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Number of stored entries, live or not yet purged.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.len())
    }

    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.read()?.is_empty())
    }

    /// Drop every expired entry and return how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Unavailable`] if the lock is poisoned.
    pub fn purge_expired(&self) -> Result<usize, CacheError> {
        let now = Instant::now();
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        let purged = before - entries.len();
        if purged > 0 {
            tracing::debug!(purged, namespace = %self.namespace, "purged expired cache entries");
        }
        Ok(purged)
    }

    fn key(&self, subject: UserId, direction: Direction) -> String {
        CacheKey::new(&self.namespace, direction, subject).to_string()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.entries
            .read()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Entry>>, CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::Unavailable("memory cache lock poisoned".into()))
    }
}

impl CacheLayer for MemoryCache {
    fn get(&self, subject: UserId, direction: Direction) -> Result<Option<IdSet>, CacheError> {
        let key = self.key(subject, direction);
        let now = Instant::now();
        Ok(self
            .read()?
            .get(&key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.ids.clone()))
    }

    fn put(
        &self,
        subject: UserId,
        direction: Direction,
        ids: &IdSet,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let key = self.key(subject, direction);
        let entry = Entry {
            ids: ids.clone(),
            expires_at: Instant::now().checked_add(ttl),
        };
        self.write()?.insert(key, entry);
        Ok(())
    }

    fn invalidate(&self, subject: UserId, direction: Direction) -> Result<(), CacheError> {
        let key = self.key(subject, direction);
        self.write()?.remove(&key);
        Ok(())
    }

    fn has(&self, subject: UserId, direction: Direction) -> Result<bool, CacheError> {
        let key = self.key(subject, direction);
        let now = Instant::now();
        Ok(self.read()?.get(&key).is_some_and(|entry| entry.is_live(now)))
    }

    fn contains(
        &self,
        subject: UserId,
        direction: Direction,
        member: UserId,
    ) -> Result<Option<bool>, CacheError> {
        let key = self.key(subject, direction);
        let now = Instant::now();
        Ok(self
            .read()?
            .get(&key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.ids.contains(&member)))
    }
}
