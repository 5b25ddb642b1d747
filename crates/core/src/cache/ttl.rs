use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use super::clock::{Clock, SystemClock};

/// A cached value and the Unix-millisecond instant after which it is expired.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub expiry: i64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: i64) -> bool {
        now > self.expiry
    }
}

/// Outcome of [`TtlCache::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<V> {
    Fresh(V),
    /// No fresh entry, but a value was stored under this key before. It stays
    /// available until the next `set`, so a caller may keep serving it, explicitly
    /// flagged, for as long as nothing better turns up.
    Stale(V),
    Missing,
}

impl<V> Lookup<V> {
    pub fn fresh(self) -> Option<V> {
        match self {
            Lookup::Fresh(v) => Some(v),
            _ => None,
        }
    }
}

/// Process-local key/value store with per-entry expiry.
///
/// Expiry is re-checked on every read, so correctness never depends on the sweeper;
/// [`TtlCache::sweep`] only reclaims memory from entries nobody reads again.
///
/// Besides the expiring entries, the last value written under each key is kept as
/// a last-known-good copy. Expiry and sweeps leave it alone; only a newer `set`,
/// `remove` or `clear` replaces it. [`TtlCache::lookup`] hands it back as
/// [`Lookup::Stale`].
///
/// Guarded by a mutex: no await happens while the lock is held.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    clock: Arc<dyn Clock>,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    last_good: HashMap<String, V>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                last_good: HashMap::new(),
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Value for `key` unless it is missing or expired. An expired entry is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        self.lookup(key).fresh()
    }

    /// Like [`TtlCache::get`] but falls back to the last-known-good value once the
    /// entry has expired or been swept.
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        match inner.entries.get(key).map(|e| (e.is_expired(now), e.value.clone())) {
            Some((false, value)) => {
                debug!(key, "Cache HIT");
                return Lookup::Fresh(value);
            }
            Some((true, _)) => {
                debug!(key, "Cache entry expired");
                inner.entries.remove(key);
            }
            None => {}
        }
        match inner.last_good.get(key) {
            Some(value) => Lookup::Stale(value.clone()),
            None => {
                debug!(key, "Cache MISS");
                Lookup::Missing
            }
        }
    }

    /// Insert or overwrite `key`, expiring `ttl` from now. Also becomes the
    /// last-known-good value for `key`.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expiry = self.clock.now_millis().saturating_add(ttl_millis);
        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cache PUT");
        let mut inner = self.lock();
        inner.last_good.insert(key.clone(), value.clone());
        inner.entries.insert(key, CacheEntry { value, expiry });
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        let mut inner = self.lock();
        inner.last_good.remove(key);
        inner.entries.remove(key).map(|e| e.value)
    }

    /// Drop every expired entry. Returns how many were removed.
    /// Last-known-good values survive the sweep.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - inner.entries.len();
        if removed > 0 {
            debug!(removed, remaining = inner.entries.len(), "Cache sweep");
        }
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.last_good.clear();
    }

    /// Number of stored entries, expired ones included until read or swept.
    /// Last-known-good copies are not counted.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
