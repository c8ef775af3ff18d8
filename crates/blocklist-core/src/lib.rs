//! blocklist-core library.
//!
//! Directed "blocks" relationships between user identities, with a derived
//! per-subject membership cache that is kept consistent with the store on
//! every mutation.
//!
//! - [`store`]: the authoritative edge set (SQLite or in-memory).
//! - [`cache`]: TTL-bounded snapshots of per-subject ID sets.
//! - [`events`]: `Blocked` / `Unblocked` notifications.
//! - [`service`]: [`BlockingService`], which ties the three together.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per layer, each mapping to a stable
//!   [`ErrorCode`]; `anyhow::Result` only for configuration loading.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`). Cache
//!   faults absorbed on the read path are logged at `warn`.

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod model;
pub mod service;
pub mod store;

pub use cache::{CacheError, CacheLayer, MemoryCache, SqliteCache};
pub use config::{BlocklistConfig, ServiceConfig};
pub use error::{BlockError, ErrorCode};
pub use events::{BlockEvent, EventNotifier, NotifyError};
pub use model::{
    BlockRecord, BlockSummary, Direction, Edge, IdSet, Page, PageRequest, PageToken, UserId,
};
pub use service::BlockingService;
pub use store::{MemoryStore, RelationshipStore, SqliteStore, StoreError};
