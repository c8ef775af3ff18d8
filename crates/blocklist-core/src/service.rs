//! The blocking service: idempotent mutations, cache-first membership checks,
//! explicit cache population, and event dispatch.
//!
//! # Mutation protocol
//!
//! A mutation is confirmed by the store before anything else happens:
//!
//! 1. **Store write**: `insert`/`remove` decides whether this call changed
//!    anything. A `false` result ends the call as a reported no-op.
//! 2. **Invalidation**: drop `(actor, blocking)` and `(target, blockers)`.
//!    A failed invalidation is logged and counted; the mutation stands.
//! 3. **Event**: one [`BlockEvent`] to the notifier, unless dispatch is off.
//!    Notifier failures are logged and never propagated.
//!
//! No lock spans the three steps. A reader racing a mutation may see a stale
//! cached set until invalidation lands or the entry's TTL runs out.
//!
//! # Cache faults
//!
//! On the query path a [`CacheError`] is treated as a miss: the service logs
//! it with `warn!`, bumps [`BlockingService::cache_faults`], and answers from
//! the store. Operations whose subject *is* the cache (`cache_*`, `clear_*`)
//! propagate the error instead.
//!
//! # Identity checks
//!
//! An identity outside [`UserId::is_valid`] names no subject. Every operation
//! treats it the same way on every backend: mutations are no-ops returning
//! `false`, membership checks answer `false`, projections are empty, and
//! neither the store nor the cache is touched.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{CacheError, CacheLayer};
use crate::config::ServiceConfig;
use crate::error::BlockError;
use crate::events::{BlockEvent, EventNotifier};
use crate::model::{
    BlockRecord, BlockSummary, Direction, Edge, IdSet, Page, PageRequest, UserId,
};
use crate::store::RelationshipStore;

/// Result alias for service operations.
pub type Result<T, E = BlockError> = std::result::Result<T, E>;

/// Coordinates a [`RelationshipStore`], a [`CacheLayer`] and an
/// [`EventNotifier`].
///
/// The service holds no per-user state; every operation names its subject
/// explicitly. It is `Send + Sync` whenever its collaborators are, so share it
/// with `Arc`.
#[derive(Debug)]
pub struct BlockingService<S, C, N> {
    store: S,
    cache: C,
    notifier: N,
    config: ServiceConfig,
    cache_faults: AtomicU64,
}

impl<S, C, N> BlockingService<S, C, N>
where
    S: RelationshipStore,
    C: CacheLayer,
    N: EventNotifier,
{
    /// Build a service with the default [`ServiceConfig`].
    #[must_use]
    pub fn new(store: S, cache: C, notifier: N) -> Self {
        Self::with_config(store, cache, notifier, ServiceConfig::default())
    }

    #[must_use]
    pub const fn with_config(store: S, cache: C, notifier: N, config: ServiceConfig) -> Self {
        Self {
            store,
            cache,
            notifier,
            config,
            cache_faults: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn cache(&self) -> &C {
        &self.cache
    }

    #[must_use]
    pub const fn notifier(&self) -> &N {
        &self.notifier
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Number of cache failures absorbed so far by falling back to the store
    /// or by skipping an invalidation.
    #[must_use]
    pub fn cache_faults(&self) -> u64 {
        self.cache_faults.load(Ordering::Relaxed)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Make `actor` block `target`.
    ///
    /// Returns `false` for a self-block or when the edge already exists. An
    /// identity outside [`UserId::is_valid`] is also a `false` no-op.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store write cannot be
    /// confirmed. Nothing is invalidated or emitted in that case.
    pub fn block(&self, actor: UserId, target: UserId) -> Result<bool> {
        if actor == target {
            debug!(%actor, "ignoring self-block");
            return Ok(false);
        }
        if !names_subjects("block", &[actor, target]) {
            return Ok(false);
        }
        if !self.store.insert(actor, target)? {
            debug!(%actor, %target, "block already present");
            return Ok(false);
        }

        debug!(%actor, %target, "blocked");
        self.invalidate_pair(Edge::new(actor, target));
        self.dispatch(BlockEvent::Blocked {
            actor_id: actor,
            target_id: target,
        });
        Ok(true)
    }

    /// Remove `actor`'s block on `target`.
    ///
    /// Returns `false` when there was no such block or either identity is
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store write cannot be
    /// confirmed.
    pub fn unblock(&self, actor: UserId, target: UserId) -> Result<bool> {
        if !names_subjects("unblock", &[actor, target]) {
            return Ok(false);
        }
        if !self.store.remove(actor, target)? {
            debug!(%actor, %target, "no block to remove");
            return Ok(false);
        }

        debug!(%actor, %target, "unblocked");
        self.invalidate_pair(Edge::new(actor, target));
        self.dispatch(BlockEvent::Unblocked {
            actor_id: actor,
            target_id: target,
        });
        Ok(true)
    }

    /// Flip the block state and return the new state (`true` = blocking).
    ///
    /// The read and the write are not atomic. If a concurrent caller wins the
    /// race, this call's write is a no-op and the returned state still
    /// reflects the direction it tried to move in.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read or
    /// written.
    pub fn toggle_block(&self, actor: UserId, target: UserId) -> Result<bool> {
        if self.is_blocking(actor, target)? {
            self.unblock(actor, target)?;
            Ok(false)
        } else {
            self.block(actor, target)?;
            Ok(actor != target && actor.is_valid() && target.is_valid())
        }
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Whether `actor` blocks `target`.
    ///
    /// Answers from the cached `(actor, blocking)` set when present, otherwise
    /// from the store. A miss does not populate the cache.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store must be consulted and
    /// cannot be read.
    pub fn is_blocking(&self, actor: UserId, target: UserId) -> Result<bool> {
        if !names_subjects("is_blocking", &[actor, target]) {
            return Ok(false);
        }
        if let Some(hit) = self.cached_membership(actor, Direction::Blocking, target) {
            return Ok(hit);
        }
        Ok(self.store.exists(actor, target)?)
    }

    /// Whether `subject` is blocked by `other`, i.e. the edge
    /// `other -> subject` exists.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store must be consulted and
    /// cannot be read.
    pub fn is_blocked_by(&self, subject: UserId, other: UserId) -> Result<bool> {
        if !names_subjects("is_blocked_by", &[subject, other]) {
            return Ok(false);
        }
        if let Some(hit) = self.cached_membership(subject, Direction::Blockers, other) {
            return Ok(hit);
        }
        Ok(self.store.exists(other, subject)?)
    }

    /// A block exists in either direction between `a` and `b`.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn has_block_with(&self, a: UserId, b: UserId) -> Result<bool> {
        Ok(self.is_blocking(a, b)? || self.is_blocked_by(a, b)?)
    }

    /// Both `a -> b` and `b -> a` exist.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn is_mutually_blocking(&self, a: UserId, b: UserId) -> Result<bool> {
        Ok(self.is_blocking(a, b)? && self.is_blocked_by(a, b)?)
    }

    // -----------------------------------------------------------------------
    // Projections
    // -----------------------------------------------------------------------

    /// Identities `subject` blocks, in the order the blocks were made.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blocking_ids(&self, subject: UserId) -> Result<Vec<UserId>> {
        if !names_subjects("blocking_ids", &[subject]) {
            return Ok(Vec::new());
        }
        Ok(self.store.list_out_edges(subject)?)
    }

    /// Identities blocking `subject`, in the order the blocks were made.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blockers_ids(&self, subject: UserId) -> Result<Vec<UserId>> {
        if !names_subjects("blockers_ids", &[subject]) {
            return Ok(Vec::new());
        }
        Ok(self.store.list_in_edges(subject)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blocking_and_blockers_ids(&self, subject: UserId) -> Result<BlockSummary> {
        Ok(BlockSummary {
            blocking: self.blocking_ids(subject)?,
            blockers: self.blockers_ids(subject)?,
        })
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blocking_records(&self, subject: UserId) -> Result<Vec<BlockRecord>> {
        if !names_subjects("blocking_records", &[subject]) {
            return Ok(Vec::new());
        }
        Ok(self.store.out_records(subject)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blocker_records(&self, subject: UserId) -> Result<Vec<BlockRecord>> {
        if !names_subjects("blocker_records", &[subject]) {
            return Ok(Vec::new());
        }
        Ok(self.store.in_records(subject)?)
    }

    /// The edges that exist between `a` and `b`, `a -> b` first.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn block_relationships_with(&self, a: UserId, b: UserId) -> Result<Vec<Edge>> {
        if !names_subjects("block_relationships_with", &[a, b]) {
            return Ok(Vec::new());
        }
        Ok(self.store.find_edges_involving(a, b)?)
    }

    /// Every edge with `subject` at either end.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn relationships_of(&self, subject: UserId) -> Result<Vec<BlockRecord>> {
        if !names_subjects("relationships_of", &[subject]) {
            return Ok(Vec::new());
        }
        Ok(self.store.edges_touching(subject)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blocking_page(&self, subject: UserId, request: PageRequest) -> Result<Page> {
        if !names_subjects("blocking_page", &[subject]) {
            return Ok(Page::default());
        }
        Ok(self.store.page_out_edges(subject, request)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blockers_page(&self, subject: UserId, request: PageRequest) -> Result<Page> {
        if !names_subjects("blockers_page", &[subject]) {
            return Ok(Page::default());
        }
        Ok(self.store.page_in_edges(subject, request)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blocking_count(&self, subject: UserId) -> Result<u64> {
        if !names_subjects("blocking_count", &[subject]) {
            return Ok(0);
        }
        Ok(self.store.count_out_edges(subject)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read.
    pub fn blockers_count(&self, subject: UserId) -> Result<u64> {
        if !names_subjects("blockers_count", &[subject]) {
            return Ok(0);
        }
        Ok(self.store.count_in_edges(subject)?)
    }

    // -----------------------------------------------------------------------
    // Explicit cache management
    // -----------------------------------------------------------------------

    /// Recompute `subject`'s blocking set from the store and cache it for
    /// `ttl`, or the configured default. Returns the cached set.
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read, or
    /// [`BlockError::Cache`] if the cache cannot be written.
    pub fn cache_blocking(&self, subject: UserId, ttl: Option<Duration>) -> Result<IdSet> {
        self.populate(subject, Direction::Blocking, ttl)
    }

    /// Blockers counterpart of [`cache_blocking`](Self::cache_blocking).
    ///
    /// # Errors
    ///
    /// Returns [`BlockError::Storage`] if the store cannot be read, or
    /// [`BlockError::Cache`] if the cache cannot be written.
    pub fn cache_blockers(&self, subject: UserId, ttl: Option<Duration>) -> Result<IdSet> {
        self.populate(subject, Direction::Blockers, ttl)
    }

    /// The cached blocking set, or an empty set when nothing is cached.
    #[must_use]
    pub fn blocking_cache(&self, subject: UserId) -> IdSet {
        self.cached_set(subject, Direction::Blocking)
    }

    /// The cached blockers set, or an empty set when nothing is cached.
    #[must_use]
    pub fn blockers_cache(&self, subject: UserId) -> IdSet {
        self.cached_set(subject, Direction::Blockers)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Cache`] if the cache cannot be written.
    pub fn clear_blocking_cache(&self, subject: UserId) -> Result<()> {
        if !names_subjects("clear_blocking_cache", &[subject]) {
            return Ok(());
        }
        Ok(self.cache.invalidate(subject, Direction::Blocking)?)
    }

    /// # Errors
    ///
    /// Returns [`BlockError::Cache`] if the cache cannot be written.
    pub fn clear_blockers_cache(&self, subject: UserId) -> Result<()> {
        if !names_subjects("clear_blockers_cache", &[subject]) {
            return Ok(());
        }
        Ok(self.cache.invalidate(subject, Direction::Blockers)?)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn populate(
        &self,
        subject: UserId,
        direction: Direction,
        ttl: Option<Duration>,
    ) -> Result<IdSet> {
        if !names_subjects("populate cache", &[subject]) {
            return Ok(IdSet::new());
        }
        self.cache.invalidate(subject, direction)?;
        let ids: IdSet = match direction {
            Direction::Blocking => self.store.list_out_edges(subject)?,
            Direction::Blockers => self.store.list_in_edges(subject)?,
        }
        .into_iter()
        .collect();
        let ttl = ttl.unwrap_or(self.config.cache_ttl_default);
        self.cache.put(subject, direction, &ids, ttl)?;
        debug!(%subject, %direction, size = ids.len(), ttl_secs = ttl.as_secs(), "cache populated");
        Ok(ids)
    }

    fn cached_membership(
        &self,
        subject: UserId,
        direction: Direction,
        member: UserId,
    ) -> Option<bool> {
        match self.cache.contains(subject, direction, member) {
            Ok(hit) => {
                if hit.is_some() {
                    debug!(%subject, %direction, "membership answered from cache");
                }
                hit
            }
            Err(err) => {
                self.record_fault(&err, subject, direction, "cache read failed, using store");
                None
            }
        }
    }

    fn cached_set(&self, subject: UserId, direction: Direction) -> IdSet {
        if !names_subjects("read cache", &[subject]) {
            return IdSet::new();
        }
        match self.cache.get(subject, direction) {
            Ok(ids) => ids.unwrap_or_default(),
            Err(err) => {
                self.record_fault(&err, subject, direction, "cache read failed, reporting empty");
                IdSet::new()
            }
        }
    }

    fn invalidate_pair(&self, edge: Edge) {
        for (subject, direction) in [
            (edge.blocker, Direction::Blocking),
            (edge.blocked, Direction::Blockers),
        ] {
            if let Err(err) = self.cache.invalidate(subject, direction) {
                self.record_fault(&err, subject, direction, "invalidation failed after commit");
            }
        }
    }

    fn dispatch(&self, event: BlockEvent) {
        if !self.config.dispatch_events {
            return;
        }
        if let Err(err) = self.notifier.notify(&event) {
            warn!(event = event.name(), error = %err, "event delivery failed");
        }
    }

    fn record_fault(&self, err: &CacheError, subject: UserId, direction: Direction, what: &str) {
        self.cache_faults.fetch_add(1, Ordering::Relaxed);
        warn!(%subject, %direction, code = %err.code(), error = %err, "{what}");
    }
}

/// `true` when every identity names a subject; logs the first that does not.
fn names_subjects(op: &'static str, ids: &[UserId]) -> bool {
    match ids.iter().find(|id| !id.is_valid()) {
        Some(id) => {
            debug!(op, %id, "identity names no subject, treating as no-op");
            false
        }
        None => true,
    }
}
