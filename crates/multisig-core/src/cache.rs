//! Client-local persistent key/value storage for transaction lists.
//!
//! Cached lists are a latency optimization only: every entry can be thrown
//! away and rebuilt from the contract at any time.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::SyncError;
use crate::types::MultisigTx;

/// Prefix shared by every transaction-list cache key.
pub const CACHE_NAMESPACE: &str = "multisig-transactions";

/// Key holding the most-recently-used order of cached contract addresses.
const INDEX_KEY: &str = "multisig-transactions-index";

/// Derives the cache key for a contract address. Distinct addresses never
/// share a key; without an address the bare namespace is returned.
pub fn cache_key(address: Option<&str>) -> String {
    match address {
        Some(addr) => format!("{CACHE_NAMESPACE}-{addr}"),
        None => CACHE_NAMESPACE.to_string(),
    }
}

/// String key/value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError>;
    fn set(&self, key: &str, value: &str) -> Result<(), SyncError>;
    fn remove(&self, key: &str) -> Result<(), SyncError>;
}

/// In-process store, used in tests and for sessions that should leave no
/// trace on disk.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, SyncError> {
        self.entries
            .lock()
            .map_err(|_| SyncError::Cache("memory store lock poisoned".into()))
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a cache directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            SyncError::Cache(format!("failed to create {}: {e}", dir.display()))
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Cache(format!("failed to read {key}: {e}"))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SyncError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)
            .and_then(|_| fs::rename(&tmp, &path))
            .map_err(|e| SyncError::Cache(format!("failed to write {key}: {e}")))
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Cache(format!("failed to remove {key}: {e}"))),
        }
    }
}

/// What happens to a contract's cache entry once nothing is watching it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    /// Remove the entry when the address changes or the sync is dropped.
    #[default]
    EvictOnTeardown,
    /// Keep entries across sessions, evicting the least recently written
    /// contract once more than `max_entries` are cached.
    Retain { max_entries: usize },
}

/// Typed access to cached transaction lists.
pub struct TransactionCache<'a> {
    store: &'a dyn KeyValueStore,
    policy: CachePolicy,
}

impl<'a> TransactionCache<'a> {
    pub fn new(store: &'a dyn KeyValueStore, policy: CachePolicy) -> Self {
        Self { store, policy }
    }

    /// Reads the cached list for `address`.
    ///
    /// A malformed entry is removed and reported as a miss.
    pub fn load(&self, address: &str) -> Option<Vec<MultisigTx>> {
        let key = cache_key(Some(address));
        let raw = match self.store.get(&key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%address, error = %e, "cache read failed");
                return None;
            }
        };

        match serde_json::from_str::<Vec<MultisigTx>>(&raw) {
            Ok(txs) => {
                debug!(%address, count = txs.len(), "hydrated transactions from cache");
                Some(txs)
            }
            Err(e) => {
                warn!(%address, error = %e, "discarding malformed cache entry");
                if let Err(e) = self.store.remove(&key) {
                    warn!(%address, error = %e, "failed to clear malformed cache entry");
                }
                None
            }
        }
    }

    /// Replaces the cached list for `address` as a whole.
    pub fn store(&self, address: &str, txs: &[MultisigTx]) -> Result<(), SyncError> {
        let json = serde_json::to_string(txs)
            .map_err(|e| SyncError::Cache(format!("failed to encode transactions: {e}")))?;
        self.store.set(&cache_key(Some(address)), &json)?;

        if let CachePolicy::Retain { max_entries } = self.policy {
            self.touch(address, max_entries)?;
        }
        Ok(())
    }

    /// Removes the entry for `address`.
    pub fn evict(&self, address: &str) -> Result<(), SyncError> {
        self.store.remove(&cache_key(Some(address)))
    }

    /// Called when a consumer stops watching `address`.
    pub fn release(&self, address: &str) -> Result<(), SyncError> {
        match self.policy {
            CachePolicy::EvictOnTeardown => self.evict(address),
            CachePolicy::Retain { .. } => Ok(()),
        }
    }

    /// Moves `address` to the front of the recency index and evicts entries
    /// beyond `max_entries`.
    fn touch(&self, address: &str, max_entries: usize) -> Result<(), SyncError> {
        let mut order: Vec<String> = match self.store.get(INDEX_KEY)? {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "resetting malformed cache index");
                Vec::new()
            }),
            None => Vec::new(),
        };

        order.retain(|a| a != address);
        order.insert(0, address.to_string());

        let keep = max_entries.max(1);
        for stale in order.split_off(keep.min(order.len())) {
            debug!(address = %stale, "evicting least recently used cache entry");
            self.evict(&stale)?;
        }

        let json = serde_json::to_string(&order)
            .map_err(|e| SyncError::Cache(format!("failed to encode cache index: {e}")))?;
        self.store.set(INDEX_KEY, &json)
    }
}
