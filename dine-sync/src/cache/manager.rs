//! Cache manager
//!
//! Every value is stored as a JSON envelope `{data, timestamp, expiresAt,
//! version}` under `"<prefix><key>"`. Persistent storage is preferred; if it
//! cannot be opened or a write fails the entry lands in the in-process
//! fallback instead. Callers never see storage errors: a failed read is a
//! miss, a failed write is logged.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::keys::CacheKey;
use super::storage::{CacheStorage, MemoryStorage, RedbStorage};
use crate::utils::{SharedClock, system_clock};

/// Cache database file name inside the configured directory
pub const CACHE_FILE: &str = "cache.redb";

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespace prepended to every logical key
    pub prefix: String,
    /// Entries stamped with another version are treated as absent
    pub version: String,
    pub default_ttl: Duration,
    /// Directory for the persistent cache file; `None` = process-scoped only
    pub storage_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "dine_cache_".to_string(),
            version: "1.0.0".to_string(),
            default_ttl: Duration::from_secs(5 * 60),
            storage_path: None,
        }
    }
}

/// Stored envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
    pub expires_at: i64,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Whether a persistent store is attached
    pub persistent: bool,
    pub persistent_entries: usize,
    pub fallback_entries: usize,
}

/// Tenant-projection cache
pub struct CacheManager {
    config: CacheConfig,
    clock: SharedClock,
    persistent: Option<Box<dyn CacheStorage>>,
    fallback: MemoryStorage,
}

impl CacheManager {
    /// Build from config, opening the redb file when a path is configured
    pub fn new(config: CacheConfig) -> Self {
        let persistent = config.storage_path.as_ref().and_then(|dir| {
            let path = dir.join(CACHE_FILE);
            match RedbStorage::open(&path) {
                Ok(storage) => {
                    tracing::info!(path = %path.display(), "Cache storage opened");
                    Some(Box::new(storage) as Box<dyn CacheStorage>)
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Cache storage unavailable, using in-memory fallback"
                    );
                    None
                }
            }
        });
        Self {
            config,
            clock: system_clock(),
            persistent,
            fallback: MemoryStorage::new(),
        }
    }

    /// Build over an explicit persistent store
    pub fn with_storage(config: CacheConfig, storage: Box<dyn CacheStorage>) -> Self {
        Self {
            config,
            clock: system_clock(),
            persistent: Some(storage),
            fallback: MemoryStorage::new(),
        }
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn physical_key(&self, key: &str) -> String {
        format!("{}{}", self.config.prefix, key)
    }

    /// Store `data` for `ttl` (default TTL when `None`)
    pub fn set<T: Serialize>(&self, key: &str, data: &T, ttl: Option<Duration>) {
        let now = self.clock.now_millis();
        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let entry = CacheEntry {
            data,
            timestamp: now,
            expires_at: now.saturating_add(ttl.as_millis() as i64),
            version: self.config.version.clone(),
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };

        let physical = self.physical_key(key);
        if let Some(storage) = &self.persistent {
            match storage.set(&physical, &raw) {
                Ok(()) => {
                    // 防止旧的回退副本遮蔽新值
                    let _ = self.fallback.remove(&physical);
                    return;
                }
                Err(e) => {
                    tracing::warn!(key, error = %e, "Cache write failed, using in-memory fallback");
                    // 旧的持久副本不能再被读到
                    if let Err(e) = storage.remove(&physical) {
                        tracing::warn!(key, error = %e, "Failed to drop stale persistent entry");
                    }
                }
            }
        }
        let _ = self.fallback.set(&physical, &raw);
    }

    /// Fresh value for `key`, or `None`
    ///
    /// Expired, version-mismatched and undecodable entries are purged.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let physical = self.physical_key(key);
        let raw = self.read_raw(&physical)?;

        let entry: CacheEntry<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key, error = %e, "Corrupt cache entry, purging");
                self.purge(&physical);
                return None;
            }
        };

        if entry.version != self.config.version {
            tracing::debug!(key, version = %entry.version, "Stale cache version, purging");
            self.purge(&physical);
            return None;
        }
        if self.clock.now_millis() > entry.expires_at {
            tracing::debug!(key, "Cache entry expired, purging");
            self.purge(&physical);
            return None;
        }

        match serde_json::from_value(entry.data) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::debug!(key, error = %e, "Cache payload shape mismatch, purging");
                self.purge(&physical);
                None
            }
        }
    }

    /// 回退副本只在持久写失败后存在, 因此优先
    fn read_raw(&self, physical: &str) -> Option<String> {
        if let Ok(Some(raw)) = self.fallback.get(physical) {
            return Some(raw);
        }
        if let Some(storage) = &self.persistent {
            match storage.get(physical) {
                Ok(Some(raw)) => return Some(raw),
                Ok(None) => {}
                Err(e) => tracing::warn!(key = physical, error = %e, "Cache read failed"),
            }
        }
        None
    }

    fn purge(&self, physical: &str) {
        let keys = [physical.to_string()];
        self.remove_physical(&keys);
    }

    fn remove_physical(&self, keys: &[String]) -> usize {
        let mut removed = 0;
        if let Some(storage) = &self.persistent {
            match storage.remove_many(keys) {
                Ok(n) => removed += n,
                Err(e) => tracing::warn!(error = %e, "Cache remove failed"),
            }
        }
        removed + self.fallback.remove_many(keys).unwrap_or(0)
    }

    /// Remove `key`; a subsequent `get` always misses
    pub fn remove(&self, key: &str) {
        self.purge(&self.physical_key(key));
    }

    /// Remove every entry under the configured prefix
    pub fn clear_all(&self) -> usize {
        let prefix = self.config.prefix.as_str();
        let mut keys = Vec::new();
        if let Some(storage) = &self.persistent {
            match storage.keys_with_prefix(prefix) {
                Ok(found) => keys.extend(found),
                Err(e) => tracing::warn!(error = %e, "Cache scan failed"),
            }
        }
        keys.extend(self.fallback.keys_with_prefix(prefix).unwrap_or_default());
        keys.sort();
        keys.dedup();

        let removed = self.remove_physical(&keys);
        tracing::info!(removed, "Cache cleared");
        removed
    }

    /// Drop every cached projection of one tenant in a single write
    pub fn invalidate_tenant(&self, tenant_id: &str) -> usize {
        let keys: Vec<String> = CacheKey::all_for_tenant(tenant_id)
            .iter()
            .map(|k| self.physical_key(k))
            .collect();
        let removed = self.remove_physical(&keys);
        tracing::debug!(tenant_id, removed, "Tenant cache invalidated");
        removed
    }

    /// Cached value if fresh, otherwise `fetcher()` stored under `key`
    ///
    /// Fetch errors are returned as-is and nothing is stored.
    pub async fn cached_fetch<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        force_refresh: bool,
        fetcher: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !force_refresh && let Some(cached) = self.get::<T>(key) {
            tracing::trace!(key, "Cache hit");
            return Ok(cached);
        }

        let data = fetcher().await?;
        self.set(key, &data, ttl);
        Ok(data)
    }

    pub fn stats(&self) -> CacheStats {
        let persistent_entries = self
            .persistent
            .as_ref()
            .and_then(|s| s.len().ok())
            .unwrap_or(0);
        CacheStats {
            persistent: self.persistent.is_some(),
            persistent_entries,
            fallback_entries: self.fallback.len().unwrap_or(0),
        }
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("config", &self.config)
            .field("persistent", &self.persistent.is_some())
            .finish()
    }
}
