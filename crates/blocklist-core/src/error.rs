use std::fmt;

/// Machine-readable error codes for operators and calling services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigParseError,
    InvalidOperand,
    StorageUnavailable,
    SchemaMigrationFailed,
    CacheUnavailable,
    CachePayloadCorrupt,
    NotifierFailed,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1001",
            Self::InvalidOperand => "E2001",
            Self::StorageUnavailable => "E3001",
            Self::SchemaMigrationFailed => "E3002",
            Self::CacheUnavailable => "E4001",
            Self::CachePayloadCorrupt => "E4002",
            Self::NotifierFailed => "E5001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::ConfigParseError => "Config file parse error",
            Self::InvalidOperand => "Invalid user identity",
            Self::StorageUnavailable => "Relationship store unavailable",
            Self::SchemaMigrationFailed => "Relationship store migration failed",
            Self::CacheUnavailable => "Cache backend unavailable",
            Self::CachePayloadCorrupt => "Cache entry could not be decoded",
            Self::NotifierFailed => "Event notification failed",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::ConfigParseError => Some("Fix syntax in blocklist.toml and retry."),
            Self::InvalidOperand => Some("User IDs are positive 64-bit integers."),
            Self::StorageUnavailable => {
                Some("Check that the database path is reachable and not locked by another writer.")
            }
            Self::SchemaMigrationFailed => {
                Some("The database was written by a newer release or is corrupt.")
            }
            Self::CacheUnavailable => {
                Some("Reads fall back to the store until the cache recovers.")
            }
            Self::CachePayloadCorrupt => Some("Run `blk cache clear` for the affected subject."),
            Self::NotifierFailed => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors surfaced by [`BlockingService`](crate::service::BlockingService).
///
/// Self-block attempts and missing edges are not errors: mutations report them
/// as `Ok(false)`. `InvalidOperand` only appears when a raw identity fails to
/// parse into a [`UserId`](crate::model::UserId).
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    #[error("{}: invalid user identity {raw:?}: {reason}", ErrorCode::InvalidOperand)]
    InvalidOperand { raw: String, reason: &'static str },

    #[error(transparent)]
    Storage(#[from] crate::store::StoreError),

    #[error(transparent)]
    Cache(#[from] crate::cache::CacheError),
}

impl BlockError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidOperand { .. } => ErrorCode::InvalidOperand,
            Self::Storage(err) => err.code(),
            Self::Cache(err) => err.code(),
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}
