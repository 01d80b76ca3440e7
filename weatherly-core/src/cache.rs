//! Best-effort TTL cache over a string key-value store.
//!
//! The store is the persistence boundary (a JSON file on disk, or memory in
//! tests). [`Cache`] layers `{data, timestamp}` envelopes and expiry on top and
//! never lets a storage failure escape: a broken store behaves like an empty one.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{
    collections::{BTreeMap, HashMap},
    fmt::Debug,
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};
use tracing::{debug, warn};

use crate::error::CacheError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Upper bound on the size of the cache file, keys and values included.
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    fn set(&self, key: &str, value: String) -> Result<(), CacheError>;
    fn remove(&self, key: &str) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;

    /// Drop every entry for which `keep(key, value)` is false. Returns how
    /// many entries were dropped.
    fn retain(&self, keep: &mut dyn FnMut(&str, &str) -> bool) -> Result<usize, CacheError>;
}

pub trait Clock: Send + Sync + Debug {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, CacheError> {
    mutex.lock().map_err(|_| CacheError::Unavailable("store lock poisoned".to_string()))
}

fn footprint<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(k, v)| k.len() + v.len()).sum()
}

/// In-process store with an optional byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity: usize) -> Self {
        Self { entries: Mutex::default(), capacity: Some(capacity) }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries)?;

        if let Some(capacity) = self.capacity {
            let others = footprint(entries.iter().filter(|(k, _)| k.as_str() != key));
            let needed = others + key.len() + value.len();
            if needed > capacity {
                return Err(CacheError::QuotaExceeded { needed, capacity });
            }
        }

        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        lock(&self.entries)?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        lock(&self.entries)?.clear();
        Ok(())
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &str) -> bool) -> Result<usize, CacheError> {
        let mut entries = lock(&self.entries)?;
        let before = entries.len();
        entries.retain(|k, v| keep(k.as_str(), v.as_str()));
        Ok(before - entries.len())
    }
}

/// All entries in a single JSON document, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    capacity: usize,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or lazily create) the store at `path`. An unreadable document is
    /// discarded rather than treated as fatal.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Result<Self, CacheError> {
        let path = path.into();

        let entries = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("discarding unreadable cache file {}: {err}", path.display());
                BTreeMap::new()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self { path, capacity, entries: Mutex::new(entries) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), CacheError> {
        let document = serde_json::to_string(entries)?;
        if document.len() > self.capacity {
            return Err(CacheError::QuotaExceeded {
                needed: document.len(),
                capacity: self.capacity,
            });
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, document)?;
        Ok(())
    }

    /// Apply `change` to a copy, persist it, and only then publish it.
    fn mutate(&self, change: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), CacheError> {
        let mut entries = lock(&self.entries)?;
        let mut next = entries.clone();
        change(&mut next);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(lock(&self.entries)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), CacheError> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.mutate(BTreeMap::clear)
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &str) -> bool) -> Result<usize, CacheError> {
        let mut dropped = 0;
        self.mutate(|entries| {
            let before = entries.len();
            entries.retain(|k, v| keep(k.as_str(), v.as_str()));
            dropped = before - entries.len();
        })?;
        Ok(dropped)
    }
}

/// Open a [`FileStore`], falling back to memory when the file cannot be used.
pub fn open_store(path: &Path, capacity: usize) -> Arc<dyn KeyValueStore> {
    match FileStore::open(path, capacity) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            warn!("cache file {} unavailable, caching in memory only: {err}", path.display());
            Arc::new(MemoryStore::with_capacity_bytes(capacity))
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    data: T,
    timestamp: i64,
}

/// Just the age of an entry, whatever its payload.
#[derive(Deserialize)]
struct EntryStamp {
    timestamp: i64,
}

/// The shared response cache. Cheap to clone; clones share the store.
#[derive(Debug, Clone)]
pub struct Cache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl Cache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, clock: Arc::new(SystemClock), ttl: DEFAULT_TTL }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// Fresh value under `key`, if any. Expired entries are removed.
    pub fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key, "error reading from cache: {err}");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(key, "error reading from cache: {err}");
                return None;
            }
        };

        let age_ms = self.clock.now_ms().saturating_sub(entry.timestamp);
        if self.is_fresh(age_ms) {
            debug!(key, age_ms, "cache hit");
            return Some(entry.data);
        }

        debug!(key, age_ms, "cache entry expired");
        if let Err(err) = self.store.remove(key) {
            warn!(key, "error purging expired cache entry: {err}");
        }
        None
    }

    fn is_fresh(&self, age_ms: i64) -> bool {
        i128::from(age_ms) < self.ttl.as_millis() as i128
    }

    /// Store `data` under `key`. When the store is full, expired entries of
    /// any key are swept and the write is tried once more.
    pub fn write<T: Serialize>(&self, key: &str, data: &T) {
        let entry = CacheEntry { data, timestamp: self.clock.now_ms() };

        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key, "error writing to cache: {err}");
                return;
            }
        };

        let result = match self.store.set(key, raw.clone()) {
            Err(CacheError::QuotaExceeded { .. }) if self.purge_expired() > 0 => {
                self.store.set(key, raw)
            }
            result => result,
        };

        if let Err(err) = result {
            warn!(key, "error writing to cache: {err}");
        }
    }

    /// Remove every expired envelope from the store. Entries that are not
    /// envelopes are left alone. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut keep = |_: &str, raw: &str| match serde_json::from_str::<EntryStamp>(raw) {
            Ok(stamp) => self.is_fresh(now.saturating_sub(stamp.timestamp)),
            Err(_) => true,
        };

        match self.store.retain(&mut keep) {
            Ok(dropped) => {
                debug!(dropped, "swept expired cache entries");
                dropped
            }
            Err(err) => {
                warn!("error sweeping expired cache entries: {err}");
                0
            }
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.store.clear() {
            warn!("error clearing cache: {err}");
        }
    }
}
