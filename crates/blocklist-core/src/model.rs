//! Core value types: identities, edges, directions, and pagination.
//!
//! Identities are opaque positive 64-bit integers wrapped in [`UserId`]. An
//! [`Edge`] is the atomic fact `blocker blocks blocked`; the store owns any
//! metadata attached to it (see [`BlockRecord`]).

#![allow(clippy::module_name_repetitions)]

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BlockError;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Opaque user identity.
///
/// Valid identities are `1..=i64::MAX`. Parsing through [`FromStr`] or
/// [`UserId::try_from`] rejects anything else. [`UserId::new`] and
/// `From<u64>` skip validation; the service treats an identity outside the
/// valid range as one that names no subject (see [`UserId::is_valid`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(u64);

impl UserId {
    /// Largest valid raw identity; SQLite stores identities as `INTEGER`.
    pub const MAX_RAW: u64 = i64::MAX.unsigned_abs();

    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Whether the identity can name a subject in every backend.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0 && self.0 <= Self::MAX_RAW
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl TryFrom<i64> for UserId {
    type Error = BlockError;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        match u64::try_from(raw).map(Self) {
            Ok(id) if id.is_valid() => Ok(id),
            _ => Err(BlockError::InvalidOperand {
                raw: raw.to_string(),
                reason: "identity must be a positive integer",
            }),
        }
    }
}

impl FromStr for UserId {
    type Err = BlockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().parse::<u64>().map(Self) {
            Ok(id) if id.is_valid() => Ok(id),
            _ => Err(BlockError::InvalidOperand {
                raw: s.to_string(),
                reason: "identity must be a positive integer",
            }),
        }
    }
}

/// Cached payload type: an unordered membership set with deterministic
/// iteration order.
pub type IdSet = BTreeSet<UserId>;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of a subject's edges a query or cache slot covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Out-edges: the identities the subject blocks.
    Blocking,
    /// In-edges: the identities that block the subject.
    Blockers,
}

impl Direction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Blockers => "blockers",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blocking" | "out" => Ok(Self::Blocking),
            "blockers" | "blocked-by" | "in" => Ok(Self::Blockers),
            other => anyhow::bail!("unknown direction '{other}': expected blocking or blockers"),
        }
    }
}

// ---------------------------------------------------------------------------
// Edges and records
// ---------------------------------------------------------------------------

/// The atomic fact `blocker blocks blocked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub blocker: UserId,
    pub blocked: UserId,
}

impl Edge {
    #[must_use]
    pub const fn new(blocker: UserId, blocked: UserId) -> Self {
        Self { blocker, blocked }
    }

    /// Self-edges are never stored.
    #[must_use]
    pub fn is_self_edge(&self) -> bool {
        self.blocker == self.blocked
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.blocker, self.blocked)
    }
}

/// An edge together with the metadata the store keeps for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(flatten)]
    pub edge: Edge,
    /// Insert time in microseconds since the Unix epoch.
    pub created_at_us: i64,
}

/// Both directional ID lists for one subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub blocking: Vec<UserId>,
    pub blockers: Vec<UserId>,
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

/// Opaque keyset cursor: the store sequence of the last edge already returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageToken(pub(crate) i64);

impl PageToken {
    #[must_use]
    pub const fn sequence(self) -> i64 {
        self.0
    }
}

impl fmt::Display for PageToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PageToken {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let seq: i64 = s
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid page token '{s}'"))?;
        anyhow::ensure!(seq >= 0, "invalid page token '{s}'");
        Ok(Self(seq))
    }
}

/// Default number of identities per page.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// A request for one page of a subject's edges, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Resume after this cursor; `None` starts at the beginning.
    pub after: Option<PageToken>,
    /// Maximum identities to return. Zero is treated as one.
    pub size: u32,
}

impl PageRequest {
    #[must_use]
    pub const fn first(size: u32) -> Self {
        Self { after: None, size }
    }

    #[must_use]
    pub const fn after(token: PageToken, size: u32) -> Self {
        Self {
            after: Some(token),
            size,
        }
    }

    pub(crate) fn effective_size(&self) -> usize {
        usize::try_from(self.size.max(1)).unwrap_or(usize::MAX)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::first(DEFAULT_PAGE_SIZE)
    }
}

/// One page of identities plus the cursor for the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub ids: Vec<UserId>,
    /// `None` once the listing is exhausted.
    pub next: Option<PageToken>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_parses_positive_integers() {
        let id: UserId = " 42 ".parse().expect("parse");
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn user_id_rejects_zero_negative_and_garbage() {
        for raw in ["0", "-3", "abc", ""] {
            let err = raw.parse::<UserId>().expect_err(raw);
            assert!(matches!(err, BlockError::InvalidOperand { .. }), "{raw}: {err}");
        }
        assert!(UserId::try_from(-1_i64).is_err());
        assert!(UserId::try_from(0_i64).is_err());
        assert_eq!(UserId::try_from(7_i64).expect("positive").get(), 7);
    }

    #[test]
    fn user_id_outside_signed_range_is_invalid() {
        assert!(u64::MAX.to_string().parse::<UserId>().is_err());
        assert!(i64::MAX.to_string().parse::<UserId>().is_ok());
    }

    #[test]
    fn unchecked_ids_report_validity() {
        assert!(!UserId::new(0).is_valid());
        assert!(!UserId::from(u64::MAX).is_valid());
        assert!(!UserId::new(UserId::MAX_RAW + 1).is_valid());
        assert!(UserId::new(1).is_valid());
        assert!(UserId::new(UserId::MAX_RAW).is_valid());
    }

    #[test]
    fn direction_round_trips_through_str() {
        assert_eq!("blocking".parse::<Direction>().expect("parse"), Direction::Blocking);
        assert_eq!("Blocked-By".parse::<Direction>().expect("parse"), Direction::Blockers);
        assert!("sideways".parse::<Direction>().is_err());
        assert_eq!(Direction::Blockers.to_string(), "blockers");
    }

    #[test]
    fn edge_helpers() {
        let edge = Edge::new(UserId::new(1), UserId::new(2));
        assert!(!edge.is_self_edge());
        assert!(Edge::new(UserId::new(3), UserId::new(3)).is_self_edge());
        assert_eq!(edge.to_string(), "1 -> 2");
    }

    #[test]
    fn record_serializes_flat() {
        let record = BlockRecord {
            edge: Edge::new(UserId::new(1), UserId::new(2)),
            created_at_us: 10,
        };
        let json = serde_json::to_value(record).expect("serialize");
        assert_eq!(json["blocker"], 1);
        assert_eq!(json["blocked"], 2);
        assert_eq!(json["created_at_us"], 10);
    }

    #[test]
    fn zero_page_size_is_clamped() {
        assert_eq!(PageRequest::first(0).effective_size(), 1);
        assert_eq!(PageRequest::default().effective_size(), 50);
        assert!("-1".parse::<PageToken>().is_err());
    }
}
