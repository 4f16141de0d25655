//! Time-expiring cache of resolved lines.
//!
//! Entries are keyed by file identity and line number and disappear once their time-to-live
//! elapses. Expired entries are never returned, even before the periodic sweep removes them.
//! The cache is a freshness cache: it is unbounded unless `max_entries` is configured, in which
//! case the least recently used line is dropped first.

use crate::config::CacheConfig;
use lru::LruCache;
use parking_lot::Mutex;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Source of the current time, injectable for tests
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.elapsed.lock()
    }
}

/// `<file identity>#<line number>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    file: Arc<str>,
    line: u64,
}

impl CacheKey {
    pub fn new(file: Arc<str>, line: u64) -> Self {
        Self { file, line }
    }

    pub fn line(&self) -> u64 {
        self.line
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.file, self.line)
    }
}

#[derive(Debug)]
struct CacheEntry {
    text: String,
    /// `None` never expires
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// Hit/miss counters and current size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Thread-safe TTL cache of line text
#[derive(Debug)]
pub struct LineCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    /// Zero disables expiry
    ttl: Duration,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LineCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let entries = match config.max_entries.and_then(NonZeroUsize::new) {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };
        Self {
            entries: Mutex::new(entries),
            ttl: config.ttl(),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached text for `key`, unless missing or expired
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let lookup = entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.text.clone()));
        let text = match lookup {
            Some(Some(text)) => Some(text),
            Some(None) => {
                entries.pop(key);
                None
            }
            None => None,
        };

        match text {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        text
    }

    /// Store `text` under `key` with the configured TTL
    ///
    /// A TTL too large to represent as a deadline behaves like zero: the entry never expires.
    pub fn put(&self, key: CacheKey, text: String) {
        let expires_at = if self.ttl.is_zero() {
            None
        } else {
            self.clock.now().checked_add(self.ttl)
        };
        self.entries.lock().put(key, CacheEntry { text, expires_at });
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock();

        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }

    /// Purge expired entries every `period` until the cache is dropped or the task is aborted
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(strong) = cache.upgrade() else {
                    break;
                };
                let purged = strong.purge_expired();
                if purged > 0 {
                    log::debug!("Purged {} expired cache entries", purged);
                }
            }
        })
    }
}
