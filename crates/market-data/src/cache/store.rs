//! In-memory key/value store with per-entry TTL and hot-key promotion.

use std::any::{type_name, Any};
use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::errors::CacheError;

type Value = Arc<dyn Any + Send + Sync>;

struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    expires_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Read counter for one key. Outlives the entry itself so that a key keeps
/// its hotness across refreshes.
#[derive(Default)]
struct AccessStats {
    count: u64,
    hot: bool,
}

/// Snapshot of one entry, for debugging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    pub key: String,
    pub ttl: Duration,
    pub remaining: Duration,
    pub access_count: u64,
    pub is_hot: bool,
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub hot_keys: usize,
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Shared, concurrently accessible cache.
///
/// Values of any `Clone + Send + Sync + 'static` type can be stored; readers
/// name the type they expect, and a mismatch is logged and treated as a miss.
///
/// Keys read more than `hot_threshold` times are promoted: later writes to
/// them live twice as long, bounded by `cold_tier_ttl`. Counters decay on
/// every [`sweep`](Self::sweep) and keys falling below `demote_floor` lose
/// their promotion.
pub struct CacheStore {
    enabled: bool,
    default_ttl: Duration,
    cold_tier_ttl: Duration,
    hot_threshold: u64,
    demote_floor: u64,
    entries: DashMap<String, CacheEntry>,
    access: DashMap<String, AccessStats>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            default_ttl: Duration::from_millis(config.default_ttl_ms),
            cold_tier_ttl: config.cold_tier_ttl(),
            hot_threshold: config.hot_threshold,
            demote_floor: config.demote_floor,
            entries: DashMap::new(),
            access: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A store that never holds anything.
    pub fn disabled() -> Self {
        Self::new(&CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Build a cache key from a prefix and optional parts, skipping `None`.
    ///
    /// `generate_key("kline", [Some("600519"), Some("day"), None])` is
    /// `"kline:600519:day"`.
    pub fn generate_key<'a, I>(prefix: &str, parts: I) -> String
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut key = prefix.to_string();
        for part in parts.into_iter().flatten() {
            key.push(':');
            key.push_str(part);
        }
        key
    }

    /// Unexpired value for `key`, counting the read.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.lookup(key, None)
    }

    /// Like [`get`](Self::get), but entries written more than `max_age` ago
    /// count as misses.
    pub fn get_fresh<T>(&self, key: &str, max_age: Duration) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.lookup(key, Some(max_age))
    }

    /// Store a value. `ttl` defaults to the configured default; hot keys get
    /// twice their TTL up to the cold-tier ceiling.
    pub fn set<T>(&self, key: &str, value: T, ttl: Option<Duration>)
    where
        T: Send + Sync + 'static,
    {
        if !self.enabled {
            return;
        }

        let base = ttl.unwrap_or(self.default_ttl);
        let ttl = if self.is_hot(key) {
            (base * 2).min(self.cold_tier_ttl).max(base)
        } else {
            base
        };

        let now = Instant::now();
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: Arc::new(value),
                inserted_at: now,
                expires_at: now + ttl,
                ttl,
            },
        );
    }

    /// Whether an unexpired entry exists. Does not count as a read.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false)
    }

    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        before.saturating_sub(self.entries.len())
    }

    /// Drop all entries and counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.access.clear();
    }

    /// Cache-aside: return the cached value, or run `fetcher` and cache its
    /// `Ok` result. Errors are returned and never cached.
    pub async fn get_or_set<T, E, F, Fut>(
        &self,
        key: &str,
        fetcher: F,
        ttl: Option<Duration>,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get::<T>(key) {
            return Ok(value);
        }

        let value = fetcher().await?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Remove expired entries and decay read counters.
    ///
    /// Counters are halved; hot keys whose count drops below the demote floor
    /// are demoted, and counters for keys with no entry left are dropped once
    /// they reach zero. Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before.saturating_sub(self.entries.len());

        let live: HashSet<String> = self.entries.iter().map(|e| e.key().clone()).collect();

        let mut demoted = 0usize;
        self.access.retain(|key, stats| {
            stats.count /= 2;
            if stats.hot && stats.count < self.demote_floor {
                stats.hot = false;
                demoted += 1;
            }
            stats.count > 0 || live.contains(key)
        });

        if removed > 0 || demoted > 0 {
            log::debug!(
                "Cache sweep removed {} expired entries, demoted {} keys",
                removed,
                demoted
            );
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `interval` on the tokio runtime.
    ///
    /// The task holds only a weak reference and stops when the store is
    /// dropped or the returned handle is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> SweeperHandle {
        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.upgrade() {
                    Some(store) => {
                        store.sweep();
                    }
                    None => break,
                }
            }
        });
        SweeperHandle(handle)
    }

    pub fn inspect(&self, key: &str) -> Option<CacheEntryInfo> {
        // Release the entry shard before touching the counters
        let (ttl, expires_at) = self
            .entries
            .get(key)
            .map(|entry| (entry.ttl, entry.expires_at))?;
        let (access_count, is_hot) = self
            .access
            .get(key)
            .map(|s| (s.count, s.hot))
            .unwrap_or((0, false));

        Some(CacheEntryInfo {
            key: key.to_string(),
            ttl,
            remaining: expires_at.saturating_duration_since(Instant::now()),
            access_count,
            is_hot,
        })
    }

    pub fn is_hot(&self, key: &str) -> bool {
        self.access.get(key).map(|s| s.hot).unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hot_keys: self.access.iter().filter(|s| s.hot).count(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Keys with a read counter, entries or not.
    pub fn tracked_keys(&self) -> usize {
        self.access.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup<T>(&self, key: &str, max_age: Option<Duration>) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        if !self.enabled {
            return None;
        }

        self.record_access(key);

        let now = Instant::now();
        let value = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => None,
            Some(entry) => match max_age {
                Some(max_age) if now.duration_since(entry.inserted_at) > max_age => None,
                _ => Some(Arc::clone(&entry.value)),
            },
            None => None,
        };

        let Some(value) = value else {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        match value.downcast_ref::<T>() {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                let err = CacheError::TypeMismatch {
                    key: key.to_string(),
                    expected: type_name::<T>(),
                };
                log::warn!("{}", err);
                self.entries.remove(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn record_access(&self, key: &str) {
        let mut stats = self.access.entry(key.to_string()).or_default();
        stats.count += 1;
        if !stats.hot && stats.count > self.hot_threshold {
            stats.hot = true;
            log::debug!("Cache key '{}' promoted to hot tier", key);
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

/// Background sweeper task. Aborted on drop.
pub struct SweeperHandle(JoinHandle<()>);

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}
