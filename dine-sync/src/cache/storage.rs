//! Cache storage backends
//!
//! - [`RedbStorage`] - persistent, survives restarts
//! - [`MemoryStorage`] - process-scoped fallback

use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use thiserror::Error;

/// Cache table: key = prefixed logical key, value = JSON envelope
const CACHE_TABLE: TableDefinition<&str, &str> = TableDefinition::new("cache_entries");

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Raw string key/value storage under the cache manager
pub trait CacheStorage: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Remove every key in `keys` in one write; returns how many existed
    fn remove_many(&self, keys: &[String]) -> CacheResult<usize>;

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>>;

    fn len(&self) -> CacheResult<usize>;

    fn remove(&self, key: &str) -> CacheResult<bool> {
        Ok(self.remove_many(&[key.to_string()])? > 0)
    }
}

// ============================================================================
// redb
// ============================================================================

/// Persistent cache file
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create the cache database
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_in_memory() -> CacheResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> CacheResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CACHE_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }
}

impl CacheStorage for RedbStorage {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_string()))
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(CACHE_TABLE)?;
            table.insert(key, value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> CacheResult<usize> {
        let write_txn = self.db.begin_write()?;
        let mut removed = 0;
        {
            let mut table = write_txn.open_table(CACHE_TABLE)?;
            for key in keys {
                if table.remove(key.as_str())?.is_some() {
                    removed += 1;
                }
            }
        }
        write_txn.commit()?;
        Ok(removed)
    }

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;

        let mut keys = Vec::new();
        for result in table.range(prefix..)? {
            let (key, _) = result?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    fn len(&self) -> CacheResult<usize> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CACHE_TABLE)?;
        Ok(table.len()? as usize)
    }
}

// ============================================================================
// In-process fallback
// ============================================================================

/// Process-scoped map, lost on restart
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStorage for MemoryStorage {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_many(&self, keys: &[String]) -> CacheResult<usize> {
        Ok(keys
            .iter()
            .filter(|k| self.entries.remove(k.as_str()).is_some())
            .count())
    }

    fn keys_with_prefix(&self, prefix: &str) -> CacheResult<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect())
    }

    fn len(&self) -> CacheResult<usize> {
        Ok(self.entries.len())
    }
}
