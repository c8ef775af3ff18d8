use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::DEFAULT_NAMESPACE;

/// File name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "blocklist.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlocklistConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Default TTL for explicit cache population, in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            namespace: default_namespace(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_true")]
    pub dispatch: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            dispatch: default_true(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// The two inputs the blocking service consumes. Read-only; the service never
/// persists or validates them beyond falling back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceConfig {
    pub cache_ttl_default: Duration,
    pub dispatch_events: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            cache_ttl_default: Duration::from_secs(default_ttl_secs()),
            dispatch_events: default_true(),
        }
    }
}

impl BlocklistConfig {
    #[must_use]
    pub const fn service(&self) -> ServiceConfig {
        ServiceConfig {
            cache_ttl_default: Duration::from_secs(self.cache.ttl_secs),
            dispatch_events: self.events.dispatch,
        }
    }
}

/// Parse a config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<BlocklistConfig> {
    if !path.exists() {
        return Ok(BlocklistConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<BlocklistConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Resolve configuration with precedence: explicit path, then
/// `<root>/blocklist.toml`, then `<config dir>/blocklist/config.toml`, then
/// defaults.
///
/// # Errors
///
/// Returns an error if the selected file cannot be read or parsed, or if an
/// explicit path does not exist.
pub fn resolve_config(root: &Path, explicit: Option<&Path>) -> Result<BlocklistConfig> {
    if let Some(path) = explicit {
        anyhow::ensure!(path.exists(), "config file {} does not exist", path.display());
        return load_config_file(path);
    }

    let local = root.join(CONFIG_FILE_NAME);
    if local.exists() {
        tracing::debug!(path = %local.display(), "using project config");
        return load_config_file(&local);
    }

    if let Some(user) = user_config_path().filter(|path| path.exists()) {
        tracing::debug!(path = %user.display(), "using user config");
        return load_config_file(&user);
    }

    Ok(BlocklistConfig::default())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("blocklist/config.toml"))
}

const fn default_true() -> bool {
    true
}

const fn default_ttl_secs() -> u64 {
    86_400
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("blocklist.db")
}
