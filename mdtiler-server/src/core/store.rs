use super::key::CacheKey;
use crate::config::CacheSettings;
use crate::metrics;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";

/// Metadata for one stored entry; the payload lives in its own file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    file_name: String,
    size: u64,
    category: String,
    /// Unix timestamp after which the entry is treated as absent
    expires_at: u64,
}

/// On-disk index layout, written best-effort after mutations
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedIndex {
    entries: HashMap<String, EntryMeta>,
    recency: Vec<String>,
}

/// In-memory index: entry metadata plus recency order and byte accounting
///
/// One lock guards all three so concurrent puts cannot corrupt the size
/// invariant (cumulative bytes <= max_size).
#[derive(Default)]
struct StoreIndex {
    entries: HashMap<String, EntryMeta>,
    /// Least recently used at the front
    recency: VecDeque<String>,
    total_bytes: u64,
}

/// Store statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStoreStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub max_size: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub rejected: u64,
}

/// Persistent, byte-size-capped, TTL'd key->bytes store
///
/// Shared by all reader instances in the process. Every failure mode of the
/// underlying medium degrades to "always miss": the store never causes an
/// open to fail, callers just pay the fresh-open cost.
pub struct DatasetCacheStore {
    directory: PathBuf,
    max_size: u64,
    disabled: bool,
    index: RwLock<StoreIndex>,
    stats: RwLock<CacheStoreStats>,
}

impl DatasetCacheStore {
    /// Create or reopen a store under the configured directory
    ///
    /// Falls back to a temp-dir default when no directory is configured; a
    /// directory that cannot be created disables the store rather than
    /// failing construction.
    pub fn new(settings: &CacheSettings) -> Self {
        let directory = settings
            .directory
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("mdtiler-cache"));

        let mut disabled = settings.disable;
        if !disabled {
            if let Err(e) = fs::create_dir_all(&directory) {
                warn!(
                    "Cache directory {:?} unavailable ({}), degrading to always-miss",
                    directory, e
                );
                disabled = true;
            }
        }

        let index = if disabled {
            StoreIndex::default()
        } else {
            Self::load_index(&directory)
        };

        info!(
            "Dataset cache store at {:?} (max_size={} bytes, entries={}, disabled={})",
            directory,
            settings.max_size,
            index.entries.len(),
            disabled
        );

        Self {
            directory,
            max_size: settings.max_size,
            disabled,
            index: RwLock::new(index),
            stats: RwLock::new(CacheStoreStats {
                max_size: settings.max_size,
                ..Default::default()
            }),
        }
    }

    /// Rebuild the in-memory index from disk, dropping expired or
    /// payload-less entries; an unreadable index starts empty
    fn load_index(directory: &PathBuf) -> StoreIndex {
        let path = directory.join(INDEX_FILE);
        let persisted: PersistedIndex = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(idx) => idx,
                Err(e) => {
                    warn!("Discarding unreadable cache index: {}", e);
                    return StoreIndex::default();
                }
            },
            Err(_) => return StoreIndex::default(),
        };

        let now = current_timestamp();
        let mut index = StoreIndex::default();
        for (key, meta) in persisted.entries {
            if meta.expires_at <= now {
                let _ = fs::remove_file(directory.join(&meta.file_name));
                continue;
            }
            if !directory.join(&meta.file_name).is_file() {
                continue;
            }
            index.total_bytes += meta.size;
            index.entries.insert(key, meta);
        }

        // Recorded recency first, then any entries the recency list missed
        for key in persisted.recency {
            if index.entries.contains_key(&key) && !index.recency.contains(&key) {
                index.recency.push_back(key);
            }
        }
        let unordered: Vec<String> = index
            .entries
            .keys()
            .filter(|k| !index.recency.contains(*k))
            .cloned()
            .collect();
        index.recency.extend(unordered);

        index
    }

    /// Persist the index, best-effort
    fn save_index(&self, index: &StoreIndex) {
        let persisted = PersistedIndex {
            entries: index.entries.clone(),
            recency: index.recency.iter().cloned().collect(),
        };
        let json = match serde_json::to_string(&persisted) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize cache index: {}", e);
                return;
            }
        };
        if let Err(e) = fs::write(self.directory.join(INDEX_FILE), json) {
            warn!("Failed to persist cache index: {}", e);
        }
    }

    /// Fetch the payload stored under `key`
    ///
    /// Absence (miss, expiry, unreadable payload) is a normal outcome; this
    /// never errors. A hit refreshes the entry's recency.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        if self.disabled {
            return None;
        }

        let mut index = self.index.write();
        let mut stats = self.stats.write();

        let meta = match index.entries.get(key.as_str()) {
            Some(meta) => meta.clone(),
            None => {
                stats.misses += 1;
                metrics::CACHE_OPS_TOTAL
                    .with_label_values(&["get", "miss"])
                    .inc();
                debug!("Cache MISS for key: {}", key);
                return None;
            }
        };

        if meta.expires_at <= current_timestamp() {
            debug!("Cache entry expired for key: {}", key);
            self.remove_entry(&mut index, key.as_str());
            stats.misses += 1;
            metrics::CACHE_OPS_TOTAL
                .with_label_values(&["get", "expired"])
                .inc();
            self.save_index(&index);
            return None;
        }

        let payload = match fs::read(self.directory.join(&meta.file_name)) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Cache payload unreadable for key {} ({})", key, e);
                self.remove_entry(&mut index, key.as_str());
                stats.misses += 1;
                metrics::CACHE_OPS_TOTAL
                    .with_label_values(&["get", "miss"])
                    .inc();
                return None;
            }
        };

        // Move to back of the recency order (most recent)
        let text = key.as_str().to_string();
        index.recency.retain(|k| k != &text);
        index.recency.push_back(text);

        stats.hits += 1;
        metrics::CACHE_OPS_TOTAL
            .with_label_values(&["get", "hit"])
            .inc();
        debug!("Cache HIT for key: {}", key);
        Some(payload)
    }

    /// Store `payload` under `key`, expiring `ttl` seconds from now
    ///
    /// Evicts least-recently-used entries only until the payload fits.
    /// Returns false without touching any existing entry when the payload
    /// alone exceeds the cap, and on write failure.
    pub fn put(&self, key: &CacheKey, payload: &[u8], category: &str, ttl: u64) -> bool {
        if self.disabled {
            return false;
        }

        let size = payload.len() as u64;
        if size > self.max_size {
            debug!(
                "Cache PUT rejected for key {}: payload {} bytes exceeds cap {}",
                key, size, self.max_size
            );
            self.stats.write().rejected += 1;
            metrics::CACHE_OPS_TOTAL
                .with_label_values(&["put", "rejected"])
                .inc();
            return false;
        }

        let mut index = self.index.write();

        // A re-insert under the same key fully replaces the prior entry
        if index.entries.contains_key(key.as_str()) {
            self.remove_entry(&mut index, key.as_str());
        }

        // Evict no more entries than the incoming payload requires
        while index.total_bytes + size > self.max_size {
            let Some(victim) = index.recency.pop_front() else {
                break;
            };
            if let Some(meta) = index.entries.remove(&victim) {
                index.total_bytes = index.total_bytes.saturating_sub(meta.size);
                let _ = fs::remove_file(self.directory.join(&meta.file_name));
                self.stats.write().evictions += 1;
                metrics::CACHE_OPS_TOTAL
                    .with_label_values(&["evict", "ok"])
                    .inc();
                debug!("Cache EVICT: {}", victim);
            }
        }

        let file_name = key.digest();
        if let Err(e) = fs::write(self.directory.join(&file_name), payload) {
            warn!("Cache PUT failed for key {} ({})", key, e);
            self.save_index(&index);
            return false;
        }

        let meta = EntryMeta {
            file_name,
            size,
            category: category.to_string(),
            expires_at: current_timestamp() + ttl,
        };
        index.entries.insert(key.as_str().to_string(), meta);
        index.recency.push_back(key.as_str().to_string());
        index.total_bytes += size;

        {
            let mut stats = self.stats.write();
            stats.entries = index.entries.len();
            stats.total_bytes = index.total_bytes;
        }
        metrics::CACHE_OPS_TOTAL
            .with_label_values(&["put", "ok"])
            .inc();
        metrics::CACHE_ENTRIES.set(index.entries.len() as i64);
        metrics::CACHE_BYTES.set(index.total_bytes as i64);

        self.save_index(&index);
        debug!("Cache PUT: {} ({} bytes)", key, size);
        true
    }

    /// Remove every entry; lifecycle/testing only, never on the request path
    pub fn clear(&self) {
        if self.disabled {
            return;
        }

        let mut index = self.index.write();
        let count = index.entries.len();
        for meta in index.entries.values() {
            let _ = fs::remove_file(self.directory.join(&meta.file_name));
        }
        index.entries.clear();
        index.recency.clear();
        index.total_bytes = 0;

        {
            let mut stats = self.stats.write();
            stats.entries = 0;
            stats.total_bytes = 0;
        }
        metrics::CACHE_ENTRIES.set(0);
        metrics::CACHE_BYTES.set(0);

        self.save_index(&index);
        info!("Cache CLEAR ({} entries)", count);
    }

    /// Snapshot of the store's counters
    pub fn stats(&self) -> CacheStoreStats {
        let index = self.index.read();
        let mut stats = self.stats.read().clone();
        stats.entries = index.entries.len();
        stats.total_bytes = index.total_bytes;
        stats
    }

    /// Drop one entry from index, recency order and disk (best-effort)
    fn remove_entry(&self, index: &mut StoreIndex, key: &str) {
        if let Some(meta) = index.entries.remove(key) {
            index.total_bytes = index.total_bytes.saturating_sub(meta.size);
            let _ = fs::remove_file(self.directory.join(&meta.file_name));
        }
        index.recency.retain(|k| k != key);
    }
}

/// Current Unix timestamp in seconds
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
