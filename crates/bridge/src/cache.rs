use crate::identity::IdentityRecord;
use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn data(&self) -> &T {
        &self.data
    }
}

/// Concurrent map whose entries expire after a TTL, bounded by a capacity.
///
/// Expired entries are never returned. They are swept lazily at most once per
/// minute, and eagerly when an insert would exceed the capacity. If the map is
/// still full after that sweep, the entry closest to expiry is evicted.
#[derive(Clone)]
pub struct ExpiringCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    cache: Arc<DashMap<K, CacheEntry<V>>>,
    default_ttl: Duration,
    capacity: usize,
    last_cleanup: Arc<std::sync::Mutex<Instant>>,
}

impl<K, V> ExpiringCache<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration, capacity: usize) -> Self {
        Self {
            cache: Arc::new(DashMap::new()),
            default_ttl,
            capacity: capacity.max(1),
            last_cleanup: Arc::new(std::sync::Mutex::new(Instant::now())),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn maybe_cleanup(&self) {
        // Non-blocking: whoever holds the lock is already sweeping
        if let Ok(mut last_cleanup) = self.last_cleanup.try_lock()
            && last_cleanup.elapsed() >= CLEANUP_INTERVAL
        {
            *last_cleanup = Instant::now();
            drop(last_cleanup);
            self.purge_expired();
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.maybe_cleanup();

        let fresh = self
            .cache
            .get(key)
            .map(|entry| (!entry.is_expired()).then(|| entry.data().clone()));

        match fresh {
            Some(Some(value)) => Some(value),
            Some(None) => {
                self.cache.remove_if(key, |_, entry| entry.is_expired());
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.maybe_cleanup();

        if !self.cache.contains_key(&key) && self.cache.len() >= self.capacity {
            self.make_room();
        }
        self.cache.insert(key, CacheEntry::new(value, ttl));
    }

    fn make_room(&self) {
        if self.purge_expired() > 0 && self.cache.len() < self.capacity {
            return;
        }

        // The iterator holds shard read locks; release them before removing.
        let victim = self
            .cache
            .iter()
            .min_by_key(|entry| entry.value().expires_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = victim {
            self.cache.remove(&key);
        }
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.cache.len();
        self.cache.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(self.cache.len())
    }

    pub fn invalidate(&self, key: &K) {
        self.cache.remove(key);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Last verified identity per OAuth2 client id.
pub type ClientIdentityCache = ExpiringCache<String, IdentityRecord>;
