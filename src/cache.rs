//! Time-limited, compute-once result cache.
//!
//! Each key owns a slot holding a `OnceCell`. The map lock is held only long
//! enough to find or replace the slot; the computation itself runs inside the
//! cell, so concurrent callers for the same key block on it and share its
//! result instead of recomputing.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::debug;
use once_cell::sync::OnceCell;
use xxhash_rust::xxh3::xxh3_64;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ---------------------------------------------------------------------------
// Source identity
// ---------------------------------------------------------------------------

/// Content fingerprint of an input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceFingerprint {
    hash: u64,
    len: u64,
}

impl SourceFingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        SourceFingerprint {
            hash: xxh3_64(bytes),
            len: bytes.len() as u64,
        }
    }
}

impl fmt::Display for SourceFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{}", self.hash, self.len)
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

struct Slot<V> {
    /// Completion time and value, set once.
    cell: OnceCell<(Instant, Arc<V>)>,
}

impl<V> Slot<V> {
    fn empty() -> Arc<Self> {
        Arc::new(Slot {
            cell: OnceCell::new(),
        })
    }
}

pub struct ResultCache<K, V> {
    slots: Mutex<HashMap<K, Arc<Slot<V>>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> ResultCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        ResultCache {
            slots: Mutex::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<Slot<V>>>> {
        // A panic inside a computation happens outside the map lock, so the
        // map itself is never left half-updated.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_expired(&self, computed_at: Instant) -> bool {
        self.clock.now().saturating_duration_since(computed_at) >= self.ttl
    }

    /// Return the cached value for `key`, computing it if absent or expired.
    /// At most one computation per key runs at a time; a failed computation
    /// leaves the key empty so the next caller retries.
    pub fn get_or_try_compute<F, E>(&self, key: K, compute: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let slot = {
            let mut slots = self.lock();
            let stale = match slots.get(&key).and_then(|s| s.cell.get()) {
                Some((computed_at, _)) => self.is_expired(*computed_at),
                None => false,
            };
            if stale {
                debug!("cache entry {key:?} expired");
                slots.remove(&key);
            }
            Arc::clone(slots.entry(key.clone()).or_insert_with(Slot::empty))
        };

        let (_, value) = slot.cell.get_or_try_init(|| {
            debug!("cache miss for {key:?}, computing");
            let value = compute()?;
            Ok((self.clock.now(), Arc::new(value)))
        })?;
        Ok(Arc::clone(value))
    }

    /// Infallible form of [`get_or_try_compute`](Self::get_or_try_compute).
    pub fn get_or_compute<F>(&self, key: K, compute: F) -> Arc<V>
    where
        F: FnOnce() -> V,
    {
        match self.get_or_try_compute(key, || Ok::<V, std::convert::Infallible>(compute())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fresh cached value, without computing.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let slots = self.lock();
        let (computed_at, value) = slots.get(key)?.cell.get()?;
        if self.is_expired(*computed_at) {
            return None;
        }
        Some(Arc::clone(value))
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let mut slots = self.lock();
        slots.retain(|_, slot| match slot.cell.get() {
            Some((computed_at, _)) => !self.is_expired(*computed_at),
            None => true,
        });
    }

    /// Number of populated, unexpired entries.
    pub fn len(&self) -> usize {
        self.lock()
            .values()
            .filter(|slot| matches!(slot.cell.get(), Some((at, _)) if !self.is_expired(*at)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use super::*;

    /// Clock advanced by hand.
    struct ManualClock {
        now: Mutex<Instant>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(ManualClock {
                now: Mutex::new(Instant::now()),
            })
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[test]
    fn second_access_hits_cache() {
        let cache: ResultCache<&str, u32> = ResultCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            7
        };
        assert_eq!(*cache.get_or_compute("a", compute), 7);
        assert_eq!(*cache.get_or_compute("a", compute), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let clock = ManualClock::new();
        let cache: ResultCache<u8, u32> =
            ResultCache::with_clock(Duration::from_secs(100), clock.clone());
        let calls = AtomicUsize::new(0);
        let compute = || calls.fetch_add(1, Ordering::SeqCst) as u32;

        assert_eq!(*cache.get_or_compute(1, compute), 0);
        clock.advance(Duration::from_secs(99));
        assert_eq!(*cache.get_or_compute(1, compute), 0);
        assert!(cache.get(&1).is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(*cache.get_or_compute(1, compute), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache: ResultCache<u8, u32> = ResultCache::new(Duration::from_secs(60));
        let first: Result<Arc<u32>, &str> = cache.get_or_try_compute(1, || Err("boom"));
        assert_eq!(first, Err("boom"));
        assert!(cache.get(&1).is_none());
        let second: Result<Arc<u32>, &str> = cache.get_or_try_compute(1, || Ok(5));
        assert_eq!(second.map(|v| *v), Ok(5));
    }

    #[test]
    fn concurrent_misses_compute_once() {
        const THREADS: usize = 8;
        let cache: ResultCache<u8, String> = ResultCache::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);

        let results: Vec<Arc<String>> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.get_or_compute(9, || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            thread::sleep(Duration::from_millis(50));
                            "computed".to_string()
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    }

    #[test]
    fn distinct_keys_compute_independently() {
        let cache: ResultCache<u8, u8> = ResultCache::new(Duration::from_secs(60));
        assert_eq!(*cache.get_or_compute(1, || 10), 10);
        assert_eq!(*cache.get_or_compute(2, || 20), 20);
        assert_eq!(cache.len(), 2);
        cache.invalidate(&1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn purge_drops_only_expired() {
        let clock = ManualClock::new();
        let cache: ResultCache<u8, u8> =
            ResultCache::with_clock(Duration::from_secs(10), clock.clone());
        cache.get_or_compute(1, || 1);
        clock.advance(Duration::from_secs(6));
        cache.get_or_compute(2, || 2);
        clock.advance(Duration::from_secs(5));
        cache.purge_expired();
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.get(&2).map(|v| *v), Some(2));
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = SourceFingerprint::of(b"Q006;NU_NOTA_CN\nA;500");
        let b = SourceFingerprint::of(b"Q006;NU_NOTA_CN\nA;500");
        let c = SourceFingerprint::of(b"Q006;NU_NOTA_CN\nA;501");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
