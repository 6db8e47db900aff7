//! Local cache for tenant projections (menu, tables, settings, ...)
//!
//! TTL + version-tagged JSON envelopes in a redb file, with an in-process
//! fallback when persistent storage is unavailable.

mod keys;
mod manager;
mod storage;

pub use keys::{CacheKey, CacheKind, CacheTtl};
pub use manager::{CACHE_FILE, CacheConfig, CacheEntry, CacheManager, CacheStats};
pub use storage::{CacheError, CacheResult, CacheStorage, MemoryStorage, RedbStorage};
