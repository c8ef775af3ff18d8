//! Canonical SQLite schema for the relationship store.
//!
//! - `blocks` holds one row per directed edge; `seq` gives the stable
//!   insertion order used by listings and page tokens
//! - `store_meta` records the applied schema version next to `user_version`

/// Migration v1: edge table plus store metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS blocks (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    blocker_id INTEGER NOT NULL CHECK (blocker_id > 0),
    blocked_id INTEGER NOT NULL CHECK (blocked_id > 0),
    created_at_us INTEGER NOT NULL,
    UNIQUE (blocker_id, blocked_id),
    CHECK (blocker_id <> blocked_id)
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at_us INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO store_meta (id, schema_version, created_at_us)
VALUES (1, 1, CAST((julianday('now') - 2440587.5) * 86400000000 AS INTEGER));
";

/// Migration v2: read-path indexes for per-subject projections.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_blocks_blocker_seq
    ON blocks(blocker_id, seq);

CREATE INDEX IF NOT EXISTS idx_blocks_blocked_seq
    ON blocks(blocked_id, seq);
";

/// Indexes that must exist once all migrations have run.
pub const REQUIRED_INDEXES: &[&str] = &["idx_blocks_blocker_seq", "idx_blocks_blocked_seq"];
