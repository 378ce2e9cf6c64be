//! Tag-indexed TTL cache.
//!
//! Entries and the tag index live behind one `RwLock`, so an invalidation
//! removes a key from both indices in a single critical section and readers
//! never see one without the other. Reads take the shared lock and `peek`,
//! so LRU recency reflects the last store rather than the last read.
//!
//! Every invalidation bumps an epoch held under the same lock. A computation
//! records the epoch before it starts and only stores its result if nothing
//! was invalidated in the meantime; otherwise the value is returned to its
//! caller and dropped.
//!
//! Concurrent misses on one key are coalesced: the first caller computes
//! while the rest wait on a per-key gate and then read the stored entry.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use dashmap::DashMap;
use lru::LruCache;
use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::CacheKey;
use super::lock::{rw_read, rw_write};
use super::tags::CacheTag;

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT: &str = "newsdesk_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "newsdesk_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "newsdesk_cache_evict_total";
pub const METRIC_CACHE_FALLBACK: &str = "newsdesk_cache_fallback_total";
pub const METRIC_CACHE_INVALIDATED: &str = "newsdesk_cache_invalidated_entries_total";
pub const METRIC_CACHE_COMPUTE_MS: &str = "newsdesk_cache_compute_ms";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache is disabled")]
    Disabled,
    #[error("failed to encode cache value")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode cached value")]
    Decode(#[source] serde_json::Error),
}

impl CacheError {
    fn reason(&self) -> &'static str {
        match self {
            CacheError::Disabled => "disabled",
            CacheError::Encode(_) => "encode",
            CacheError::Decode(_) => "decode",
        }
    }
}

struct Entry {
    value: serde_json::Value,
    tags: Vec<CacheTag>,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

struct Index {
    entries: LruCache<String, Entry>,
    by_tag: HashMap<CacheTag, HashSet<String>>,
    epoch: u64,
}

impl Index {
    fn remove(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.unindex(key, &entry.tags);
                true
            }
            None => false,
        }
    }

    fn unindex(&mut self, key: &str, tags: &[CacheTag]) {
        for tag in tags {
            if let Some(keys) = self.by_tag.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
    }

    /// Insert and index `entry`, returning how many entries capacity evicted.
    fn insert(&mut self, key: &str, entry: Entry) -> usize {
        self.remove(key);
        for tag in &entry.tags {
            self.by_tag.entry(*tag).or_default().insert(key.to_string());
        }

        let mut evicted = 0;
        if let Some((evicted_key, evicted_entry)) = self.entries.push(key.to_string(), entry) {
            self.unindex(&evicted_key, &evicted_entry.tags);
            evicted += 1;
        }
        evicted
    }
}

pub struct TaggedCache {
    config: CacheConfig,
    index: RwLock<Index>,
    inflight: DashMap<String, Arc<Mutex<()>>>,
}

impl TaggedCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = config.max_entries_non_zero();
        Self {
            config,
            index: RwLock::new(Index {
                entries: LruCache::new(capacity),
                by_tag: HashMap::new(),
                epoch: 0,
            }),
            inflight: DashMap::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Return the live value at `key`, computing and storing it on a miss.
    ///
    /// Cache failures never fail the read: the value is computed directly
    /// and the failure is logged and counted. Errors from `compute` are
    /// returned unchanged and nothing is stored.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        tags: &[CacheTag],
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.lookup::<T>(key) {
            Ok(Some(value)) => {
                record_hit(key);
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) => return self.fallback(key, err, compute).await,
        }

        let flight = Flight::join(&self.inflight, key.as_str());
        let _permit = flight.gate.lock().await;

        match self.lookup::<T>(key) {
            Ok(Some(value)) => {
                debug!(key = %key, "Cache hit after coalesced miss");
                record_hit(key);
                return Ok(value);
            }
            Ok(None) => {}
            Err(err) => return self.fallback(key, err, compute).await,
        }

        counter!(METRIC_CACHE_MISS, "namespace" => key.namespace().as_str()).increment(1);
        debug!(key = %key, "Cache miss");

        let epoch = self.current_epoch();
        let started_at = std::time::Instant::now();
        let value = compute().await?;
        histogram!(METRIC_CACHE_COMPUTE_MS, "namespace" => key.namespace().as_str())
            .record(started_at.elapsed().as_secs_f64() * 1000.0);

        if let Err(err) = self.store(key, tags, ttl, &value, epoch) {
            warn!(key = %key, error = %err, "Computed value could not be cached");
            counter!(METRIC_CACHE_FALLBACK, "reason" => err.reason()).increment(1);
        }

        Ok(value)
    }

    async fn fallback<T, E, F, Fut>(&self, key: &CacheKey, err: CacheError, compute: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match &err {
            CacheError::Disabled => debug!(key = %key, "Cache bypassed"),
            other => warn!(key = %key, error = %other, "Cache unavailable, computing directly"),
        }
        counter!(METRIC_CACHE_FALLBACK, "reason" => err.reason()).increment(1);
        compute().await
    }

    /// Live value at `key`, if any. Expired entries read as absent.
    pub fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>, CacheError> {
        if !self.config.enabled {
            return Err(CacheError::Disabled);
        }

        let index = rw_read(&self.index, SOURCE, "lookup");
        match index.entries.peek(key.as_str()) {
            Some(entry) if entry.is_live(Instant::now()) => T::deserialize(&entry.value)
                .map(Some)
                .map_err(CacheError::Decode),
            _ => Ok(None),
        }
    }

    /// Store `value` unless an invalidation happened since `epoch`.
    ///
    /// Returns whether the value was stored.
    pub fn store<T: Serialize>(
        &self,
        key: &CacheKey,
        tags: &[CacheTag],
        ttl: Duration,
        value: &T,
        epoch: u64,
    ) -> Result<bool, CacheError> {
        if !self.config.enabled {
            return Err(CacheError::Disabled);
        }

        let value = serde_json::to_value(value).map_err(CacheError::Encode)?;
        let mut tags = tags.to_vec();
        tags.sort_unstable();
        tags.dedup();

        let mut index = rw_write(&self.index, SOURCE, "store");
        if index.epoch != epoch {
            debug!(key = %key, "Discarding value computed before an invalidation");
            return Ok(false);
        }

        let evicted = index.insert(
            key.as_str(),
            Entry {
                value,
                tags,
                expires_at: Instant::now() + ttl,
            },
        );
        drop(index);

        if evicted > 0 {
            counter!(METRIC_CACHE_EVICT).increment(evicted as u64);
        }
        Ok(true)
    }

    pub fn current_epoch(&self) -> u64 {
        rw_read(&self.index, SOURCE, "current_epoch").epoch
    }

    /// Remove every entry whose tag set intersects `tags`.
    pub fn invalidate_tags(&self, tags: &[CacheTag]) -> usize {
        let mut index = rw_write(&self.index, SOURCE, "invalidate_tags");
        index.epoch += 1;

        let mut doomed = HashSet::new();
        for tag in tags {
            if let Some(keys) = index.by_tag.remove(tag) {
                doomed.extend(keys);
            }
        }

        let removed = doomed.iter().filter(|key| index.remove(key)).count();
        drop(index);

        counter!(METRIC_CACHE_INVALIDATED, "scope" => "tags").increment(removed as u64);
        removed
    }

    pub fn invalidate_keys(&self, keys: &[CacheKey]) -> usize {
        let mut index = rw_write(&self.index, SOURCE, "invalidate_keys");
        index.epoch += 1;
        let removed = keys.iter().filter(|key| index.remove(key.as_str())).count();
        drop(index);

        counter!(METRIC_CACHE_INVALIDATED, "scope" => "keys").increment(removed as u64);
        removed
    }

    pub fn clear(&self) {
        let mut index = rw_write(&self.index, SOURCE, "clear");
        index.epoch += 1;
        index.entries.clear();
        index.by_tag.clear();
    }

    /// Whether a live entry exists at `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        rw_read(&self.index, SOURCE, "contains")
            .entries
            .peek(key.as_str())
            .is_some_and(|entry| entry.is_live(Instant::now()))
    }

    /// Keys currently indexed under `tag`.
    pub fn keys_tagged(&self, tag: CacheTag) -> usize {
        rw_read(&self.index, SOURCE, "keys_tagged")
            .by_tag
            .get(&tag)
            .map_or(0, HashSet::len)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.index, SOURCE, "len").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn record_hit(key: &CacheKey) {
    counter!(METRIC_CACHE_HIT, "namespace" => key.namespace().as_str()).increment(1);
    debug!(key = %key, "Cache hit");
}

/// Membership in the set of callers computing one key.
struct Flight<'a> {
    map: &'a DashMap<String, Arc<Mutex<()>>>,
    key: String,
    gate: Arc<Mutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(map: &'a DashMap<String, Arc<Mutex<()>>>, key: &str) -> Self {
        let gate = map.entry(key.to_string()).or_default().clone();
        Self {
            map,
            key: key.to_string(),
            gate,
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        // The map and this flight hold two references; more means waiters.
        self.map
            .remove_if(&self.key, |_, gate| Arc::strong_count(gate) <= 2);
    }
}
