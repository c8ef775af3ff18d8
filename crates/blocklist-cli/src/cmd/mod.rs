//! Subcommand handlers and the context they share.

pub mod block;
pub mod cache;
pub mod check;
pub mod info;
pub mod list;
pub mod relations;

use std::path::{Path, PathBuf};

use blocklist_core::config::BlocklistConfig;
use blocklist_core::events::TracingNotifier;
use blocklist_core::{BlockError, BlockingService, SqliteCache, SqliteStore, UserId};

use crate::output::{CliError, OutputMode, render_error};

/// The service every command runs against: one SQLite file holding both the
/// edge table and the cache table.
pub type CliService = BlockingService<SqliteStore, SqliteCache, TracingNotifier>;

/// Resolved inputs for one invocation.
#[derive(Debug)]
pub struct Context {
    pub config: BlocklistConfig,
    pub db_path: PathBuf,
    pub output: OutputMode,
}

impl Context {
    /// Open the store and cache at `db_path` and wire up the service.
    pub fn open_service(&self) -> anyhow::Result<CliService> {
        let store = SqliteStore::open(&self.db_path)
            .map_err(|err| self.fail(&BlockError::from(err)))?;
        let cache = SqliteCache::open(&self.db_path, self.config.cache.namespace.clone())
            .map_err(|err| self.fail(&BlockError::from(err)))?;
        tracing::debug!(db = %self.db_path.display(), "service ready");
        Ok(BlockingService::with_config(
            store,
            cache,
            TracingNotifier,
            self.config.service(),
        ))
    }

    /// Render `err` to stderr and turn it into the process error.
    pub fn fail(&self, err: &BlockError) -> anyhow::Error {
        if let Err(render_err) = render_error(self.output, &CliError::from(err)) {
            tracing::warn!("failed to render error: {render_err}");
        }
        anyhow::anyhow!("{err}")
    }

    /// Parse a raw identity argument, rendering a coded error on failure.
    pub fn user(&self, raw: &str) -> anyhow::Result<UserId> {
        raw.parse::<UserId>().map_err(|err| self.fail(&err))
    }
}

/// Resolve the database path: explicit flag, else the configured path
/// relative to `root`.
pub fn resolve_db_path(root: &Path, flag: Option<&Path>, config: &BlocklistConfig) -> PathBuf {
    match flag {
        Some(path) => path.to_path_buf(),
        None if config.store.path.is_absolute() => config.store.path.clone(),
        None => root.join(&config.store.path),
    }
}
