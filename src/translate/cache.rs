//! In-memory translation cache with a fixed TTL.
//! Key: blake3 hash of (model | src_lang | tgt_lang | full text).
//! Entries expire a fixed time after insertion; reads never refresh them.
//! When full, the oldest-inserted entry is evicted.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::GenerationStats;

pub type CacheKey = [u8; 32];

/// Cached value: the cleaned translation and how it was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedTranslation {
    pub translation: String,
    pub model: String,
    pub stats: Option<GenerationStats>,
}

struct CacheEntry {
    value: CachedTranslation,
    inserted_at: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
    pub inserts: u64,
    pub expired: u64,
    pub capacity: usize,
    pub ttl_secs: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    expired: AtomicU64,
}

pub struct TranslationCache {
    /// `None` when constructed with zero capacity: every lookup misses.
    inner: Option<Mutex<LruCache<CacheKey, CacheEntry>>>,
    ttl: Duration,
    capacity: usize,
    counters: Counters,
}

impl TranslationCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            ttl,
            capacity,
            counters: Counters::default(),
        }
    }

    /// Compute the cache key from translation parameters.
    /// Every field is length-prefixed and the whole text is hashed, so no two
    /// distinct parameter sets share a byte stream.
    pub fn compute_key(model: &str, src_lang: &str, tgt_lang: &str, text: &str) -> CacheKey {
        let mut hasher = blake3::Hasher::new();
        for part in [model, src_lang, tgt_lang, text] {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        *hasher.finalize().as_bytes()
    }

    /// Look up a cached translation. Returns None if absent or expired.
    pub fn get(&self, key: &CacheKey) -> Option<CachedTranslation> {
        let Some(inner) = &self.inner else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        let mut cache = inner.lock();
        // peek: a hit must not change eviction order
        let hit = match cache.peek(key) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                cache.pop(key);
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };
        drop(cache);

        let counter = if hit.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        hit
    }

    pub fn insert(&self, key: CacheKey, value: CachedTranslation) {
        let Some(inner) = &self.inner else {
            return;
        };
        inner.lock().put(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
        self.counters.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Drop every entry. Returns the number removed.
    pub fn clear(&self) -> usize {
        let Some(inner) = &self.inner else {
            return 0;
        };
        let mut cache = inner.lock();
        let removed = cache.len();
        cache.clear();
        removed
    }

    /// Remove expired entries.
    pub fn sweep_expired(&self) -> usize {
        let Some(inner) = &self.inner else {
            return 0;
        };
        let mut cache = inner.lock();
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(_, entry)| entry.inserted_at.elapsed() >= self.ttl)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            cache.pop(key);
        }
        self.counters
            .expired
            .fetch_add(stale.len() as u64, Ordering::Relaxed);
        stale.len()
    }

    pub fn len(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            keys: self.len(),
            inserts: self.counters.inserts.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            capacity: self.capacity,
            ttl_secs: self.ttl.as_secs(),
        }
    }

    /// Start the background expiry sweep. Stops when `shutdown` is cancelled.
    pub fn start_sweeper(
        cache: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep_expired();
                        if removed > 0 {
                            info!(removed, remaining = cache.len(), "cache sweep");
                        }
                    }
                    _ = shutdown.cancelled() => {
                        debug!("cache sweeper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(text: &str) -> CachedTranslation {
        CachedTranslation {
            translation: text.to_string(),
            model: "qwen2:7b".to_string(),
            stats: None,
        }
    }

    #[test]
    fn key_covers_whole_text() {
        let prefix = "x".repeat(200);
        let a = TranslationCache::compute_key("m", "auto", "zh-tw", &format!("{prefix}a"));
        let b = TranslationCache::compute_key("m", "auto", "zh-tw", &format!("{prefix}b"));
        assert_ne!(a, b);
    }

    #[test]
    fn key_separates_fields() {
        let a = TranslationCache::compute_key("m", "en", "zh-tw", "hi");
        let b = TranslationCache::compute_key("m", "en", "zh-cn", "hi");
        let c = TranslationCache::compute_key("m2", "en", "zh-tw", "hi");
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, TranslationCache::compute_key("m", "en", "zh-tw", "hi"));
    }

    #[test]
    fn separator_inside_a_field_does_not_shift_boundaries() {
        let a = TranslationCache::compute_key("m", "auto", "zh-tw", "en|Hello");
        let b = TranslationCache::compute_key("m", "auto", "zh-tw|en", "Hello");
        assert_ne!(a, b);
        let c = TranslationCache::compute_key("m|auto", "zh-tw", "", "Hello");
        let d = TranslationCache::compute_key("m", "auto|zh-tw", "", "Hello");
        assert_ne!(c, d);
    }

    #[test]
    fn hit_and_miss_are_counted() {
        let cache = TranslationCache::new(8, Duration::from_secs(60));
        let key = TranslationCache::compute_key("m", "auto", "zh-tw", "Hello");
        assert!(cache.get(&key).is_none());
        cache.insert(key, value("你好"));
        assert_eq!(cache.get(&key), Some(value("你好")));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.keys, 1);
        assert_eq!(stats.inserts, 1);
    }

    #[test]
    fn expired_entries_miss() {
        let cache = TranslationCache::new(8, Duration::ZERO);
        let key = TranslationCache::compute_key("m", "auto", "zh-tw", "Hello");
        cache.insert(key, value("你好"));
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let cache = TranslationCache::new(8, Duration::ZERO);
        cache.insert([1; 32], value("a"));
        cache.insert([2; 32], value("b"));
        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.len(), 0);

        let cache = TranslationCache::new(8, Duration::from_secs(60));
        cache.insert([1; 32], value("a"));
        assert_eq!(cache.sweep_expired(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn reads_do_not_protect_from_eviction() {
        let cache = TranslationCache::new(2, Duration::from_secs(60));
        cache.insert([1; 32], value("a"));
        cache.insert([2; 32], value("b"));
        assert!(cache.get(&[1; 32]).is_some());
        cache.insert([3; 32], value("c"));
        assert!(cache.get(&[1; 32]).is_none());
        assert!(cache.get(&[2; 32]).is_some());
    }

    #[test]
    fn zero_capacity_always_misses() {
        let cache = TranslationCache::new(0, Duration::from_secs(60));
        cache.insert([1; 32], value("a"));
        assert!(cache.get(&[1; 32]).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.clear(), 0);
    }

    #[test]
    fn clear_empties_everything() {
        let cache = TranslationCache::new(8, Duration::from_secs(60));
        cache.insert([1; 32], value("a"));
        cache.insert([2; 32], value("b"));
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_on_shutdown() {
        let cache = Arc::new(TranslationCache::new(8, Duration::from_secs(1)));
        cache.insert([1; 32], value("a"));
        let shutdown = CancellationToken::new();
        let handle = TranslationCache::start_sweeper(
            Arc::clone(&cache),
            Duration::from_secs(5),
            shutdown.clone(),
        );
        // Paused clock: sleep advances virtual time only.
        tokio::time::sleep(Duration::from_secs(6)).await;
        tokio::task::yield_now().await;
        shutdown.cancel();
        handle.await.unwrap();
        assert!(cache.is_empty());
    }
}
