//! In-process relationship store.
//!
//! Edges live in an append-ordered log guarded by an [`RwLock`]; a hash index
//! gives O(1) existence checks. Sequence numbers are never reused, so page
//! tokens stay valid across removals exactly as they do in the SQLite adapter.

use std::collections::HashSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::model::{BlockRecord, Edge, Page, PageRequest, PageToken, UserId};
use crate::store::{RelationshipStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Row {
    seq: i64,
    record: BlockRecord,
}

#[derive(Debug, Default)]
struct EdgeLog {
    next_seq: i64,
    rows: Vec<Row>,
    index: HashSet<Edge>,
}

impl EdgeLog {
    fn page<F>(&self, request: PageRequest, select: F) -> Page
    where
        F: Fn(&Edge) -> Option<UserId>,
    {
        let after = request.after.map_or(0, PageToken::sequence);
        let size = request.effective_size();

        let mut matching = self
            .rows
            .iter()
            .filter(|row| row.seq > after)
            .filter_map(|row| select(&row.record.edge).map(|id| (row.seq, id)));

        let mut ids = Vec::new();
        let mut last_seq = None;
        for (seq, id) in matching.by_ref().take(size) {
            ids.push(id);
            last_seq = Some(seq);
        }

        let next = match (last_seq, matching.next()) {
            (Some(seq), Some(_)) => Some(PageToken(seq)),
            _ => None,
        };
        Page { ids, next }
    }
}

/// Ordered in-memory edge set.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: RwLock<EdgeLog>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of edges across all subjects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.rows.len())
    }

    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.rows.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, EdgeLog>, StoreError> {
        self.log
            .read()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, EdgeLog>, StoreError> {
        self.log
            .write()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    fn records<F>(&self, keep: F) -> Result<Vec<BlockRecord>, StoreError>
    where
        F: Fn(&Edge) -> bool,
    {
        Ok(self
            .read()?
            .rows
            .iter()
            .filter(|row| keep(&row.record.edge))
            .map(|row| row.record)
            .collect())
    }
}

impl RelationshipStore for MemoryStore {
    fn exists(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        Ok(self.read()?.index.contains(&Edge::new(blocker, blocked)))
    }

    fn insert(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        let edge = Edge::new(blocker, blocked);
        if edge.is_self_edge() {
            return Ok(false);
        }

        let mut log = self.write()?;
        if !log.index.insert(edge) {
            return Ok(false);
        }
        log.next_seq += 1;
        let seq = log.next_seq;
        log.rows.push(Row {
            seq,
            record: BlockRecord {
                edge,
                created_at_us: chrono::Utc::now().timestamp_micros(),
            },
        });
        Ok(true)
    }

    fn remove(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        let edge = Edge::new(blocker, blocked);
        let mut log = self.write()?;
        if !log.index.remove(&edge) {
            return Ok(false);
        }
        log.rows.retain(|row| row.record.edge != edge);
        Ok(true)
    }

    fn list_out_edges(&self, subject: UserId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .records(|edge| edge.blocker == subject)?
            .into_iter()
            .map(|record| record.edge.blocked)
            .collect())
    }

    fn list_in_edges(&self, subject: UserId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .records(|edge| edge.blocked == subject)?
            .into_iter()
            .map(|record| record.edge.blocker)
            .collect())
    }

    fn page_out_edges(&self, subject: UserId, request: PageRequest) -> Result<Page, StoreError> {
        Ok(self
            .read()?
            .page(request, |edge| (edge.blocker == subject).then_some(edge.blocked)))
    }

    fn page_in_edges(&self, subject: UserId, request: PageRequest) -> Result<Page, StoreError> {
        Ok(self
            .read()?
            .page(request, |edge| (edge.blocked == subject).then_some(edge.blocker)))
    }

    fn count_out_edges(&self, subject: UserId) -> Result<u64, StoreError> {
        let log = self.read()?;
        Ok(log.index.iter().filter(|edge| edge.blocker == subject).count() as u64)
    }

    fn count_in_edges(&self, subject: UserId) -> Result<u64, StoreError> {
        let log = self.read()?;
        Ok(log.index.iter().filter(|edge| edge.blocked == subject).count() as u64)
    }

    fn out_records(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError> {
        self.records(|edge| edge.blocker == subject)
    }

    fn in_records(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError> {
        self.records(|edge| edge.blocked == subject)
    }

    fn edges_touching(&self, subject: UserId) -> Result<Vec<BlockRecord>, StoreError> {
        self.records(|edge| edge.blocker == subject || edge.blocked == subject)
    }
}
