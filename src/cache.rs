// TTL cache for seat and route lookups.
//
// One instance lives inside a booking session and is passed explicitly to
// whatever needs it; there is no module-level singleton. Seat availability is
// volatile, so the TTL shrinks as the remaining free-seat count drops and
// grows when a leg is mostly empty. Reads past the TTL behave as misses;
// writes always overwrite. Nothing beyond TTL expiry is evicted at this
// scale.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Flat TTL used when no occupancy hint accompanies a write.
    pub default_ttl: Duration,
    /// TTL floor, used when a leg is nearly sold out.
    pub min_ttl: Duration,
    /// TTL ceiling, used when a leg is mostly free.
    pub max_ttl: Duration,
    /// Free-seat count at or above which the ceiling applies.
    pub plenty_threshold: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(5 * 60),
            min_ttl: Duration::from_secs(2 * 60),
            max_ttl: Duration::from_secs(10 * 60),
            plenty_threshold: 20,
        }
    }
}

#[derive(Debug, Default)]
struct CacheStats {
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
    expired_count: AtomicUsize,
    total_lookups: AtomicUsize,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub items_count: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub expired_count: usize,
    pub total_lookups: usize,
}

struct CacheEntry<T> {
    value: T,
    created_at: Instant,
    ttl: Duration,
}

impl<T> CacheEntry<T> {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// Composite key: interval id, station pair, currency, and language all feed
/// into what the vendor returns.
pub fn create_cache_key(
    interval_id: &str,
    from_id: &str,
    to_id: &str,
    currency: &str,
    lang: &str,
) -> String {
    format!("{interval_id}:{from_id}:{to_id}:{currency}:{lang}")
}

pub struct TtlCache<T: Clone> {
    entries: DashMap<String, CacheEntry<T>>,
    config: RwLock<CacheConfig>,
    stats: CacheStats,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config: RwLock::new(config),
            stats: CacheStats::default(),
        }
    }

    /// TTL scaled by occupancy volatility: few remaining seats mean the data
    /// goes stale fast.
    pub fn ttl_for_occupancy(&self, free_seats: u32) -> Duration {
        let config = self.config.read();
        if config.plenty_threshold == 0 || free_seats >= config.plenty_threshold {
            return config.max_ttl;
        }
        let min = config.min_ttl.as_secs_f64();
        let max = config.max_ttl.as_secs_f64();
        let fraction = free_seats as f64 / config.plenty_threshold as f64;
        Duration::from_secs_f64(min + (max - min) * fraction)
    }

    /// Store a value; `ttl` of `None` uses the configured flat default.
    pub fn store(&self, key: &str, value: T, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or_else(|| self.config.read().default_ttl);
        trace!(key, ttl_secs = ttl.as_secs(), "cache store");
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Store with the TTL derived from the remaining free-seat count.
    pub fn store_with_occupancy(&self, key: &str, value: T, free_seats: u32) {
        let ttl = self.ttl_for_occupancy(free_seats);
        self.store(key, value, Some(ttl));
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.stats.total_lookups.fetch_add(1, Ordering::Relaxed);

        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired() => true,
            Some(entry) => {
                self.stats.hit_count.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            None => {
                self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        if expired {
            self.entries.remove(key);
            self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
            self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
            trace!(key, "cache entry expired");
        }
        None
    }

    /// Drop entries whose key starts with the given prefix. Used when a
    /// search is restarted and every leg under it is stale.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        let count = keys.len();
        for key in keys {
            self.entries.remove(&key);
        }
        count
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_config(&self, config: CacheConfig) {
        *self.config.write() = config;
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            items_count: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::Relaxed),
            miss_count: self.stats.miss_count.load(Ordering::Relaxed),
            expired_count: self.stats.expired_count.load(Ordering::Relaxed),
            total_lookups: self.stats.total_lookups.load(Ordering::Relaxed),
        }
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn short_config() -> CacheConfig {
        CacheConfig {
            default_ttl: Duration::from_millis(50),
            min_ttl: Duration::from_millis(20),
            max_ttl: Duration::from_millis(200),
            plenty_threshold: 20,
        }
    }

    #[test]
    fn hit_within_ttl_miss_after() {
        let cache: TtlCache<String> = TtlCache::new(short_config());
        let key = create_cache_key("X", "3", "7", "EUR", "en");

        cache.store(&key, "seats".to_string(), None);
        assert_eq!(cache.get(&key), Some("seats".to_string()));

        thread::sleep(Duration::from_millis(70));
        assert_eq!(cache.get(&key), None);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.expired_count, 1);
        assert_eq!(stats.total_lookups, 2);
    }

    #[test]
    fn writes_always_overwrite() {
        let cache: TtlCache<u32> = TtlCache::new(short_config());
        cache.store("k", 1, None);
        cache.store("k", 2, None);
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn miss_is_not_an_error_just_a_none() {
        let cache: TtlCache<u32> = TtlCache::new(short_config());
        assert_eq!(cache.get("absent"), None);
        assert_eq!(cache.stats().miss_count, 1);
    }

    #[test]
    fn ttl_scales_with_occupancy() {
        let cache: TtlCache<u32> = TtlCache::new(short_config());

        let scarce = cache.ttl_for_occupancy(1);
        let half = cache.ttl_for_occupancy(10);
        let plenty = cache.ttl_for_occupancy(25);

        assert!(scarce < half, "{scarce:?} vs {half:?}");
        assert!(half < plenty, "{half:?} vs {plenty:?}");
        assert_eq!(plenty, Duration::from_millis(200));
        assert!(scarce >= Duration::from_millis(20));
    }

    #[test]
    fn occupancy_store_expires_scarce_entries_sooner() {
        let cache: TtlCache<u32> = TtlCache::new(short_config());
        cache.store_with_occupancy("scarce", 1, 0);
        cache.store_with_occupancy("plenty", 2, 100);

        thread::sleep(Duration::from_millis(60));
        assert_eq!(cache.get("scarce"), None);
        assert_eq!(cache.get("plenty"), Some(2));
    }

    #[test]
    fn invalidate_prefix_drops_matching_entries() {
        let cache: TtlCache<u32> = TtlCache::new(short_config());
        cache.store(&create_cache_key("X", "3", "7", "EUR", "en"), 1, None);
        cache.store(&create_cache_key("X", "3", "7", "EUR", "de"), 2, None);
        cache.store(&create_cache_key("Y", "3", "7", "EUR", "en"), 3, None);

        assert_eq!(cache.invalidate_prefix("X:"), 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&create_cache_key("Y", "3", "7", "EUR", "en")).is_some());
    }

    #[test]
    fn concurrent_access_is_safe() {
        use std::sync::Arc;

        let cache: Arc<TtlCache<u64>> = Arc::new(TtlCache::new(CacheConfig::default()));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..200u64 {
                    let key = format!("k{}", (t * 7 + i) % 50);
                    if i % 3 == 0 {
                        cache.store(&key, i, None);
                    } else {
                        let _ = cache.get(&key);
                    }
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(cache.len() <= 50);
        assert!(cache.stats().total_lookups > 0);
    }
}
