//! In-process price cache with TTL expiry

use super::{PriceCache, PriceKey, PriceQuote};
use crate::clock::{Clock, SystemClock};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Default time-to-live of a cached quote
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 24;

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Price cache guarded by one read-write lock
///
/// Readers proceed concurrently; writers are exclusive. Every write first
/// drops expired entries, so the map holds at most one TTL worth of quotes.
/// A poisoned lock is treated as an empty cache.
pub struct InMemoryPriceCache {
    entries: RwLock<HashMap<PriceKey, PriceQuote>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl InMemoryPriceCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().map(|e| e.len()).unwrap_or(0),
        }
    }

    fn miss(&self) -> Option<PriceQuote> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }
}

impl Default for InMemoryPriceCache {
    fn default() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Duration::hours(DEFAULT_CACHE_TTL_HOURS),
        )
    }
}

impl PriceCache for InMemoryPriceCache {
    fn get(&self, key: &PriceKey) -> Option<PriceQuote> {
        let now = self.clock.now();
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(_) => {
                warn!("Price cache lock poisoned, treating as miss");
                return self.miss();
            }
        };

        match entries.get(key) {
            Some(quote) if quote.expires_at.map_or(false, |at| at > now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(quote.clone())
            }
            Some(_) => {
                debug!(
                    instance_type = %key.instance_type,
                    class = %key.class,
                    "Cached price expired"
                );
                self.miss()
            }
            None => self.miss(),
        }
    }

    fn put(&self, key: PriceKey, mut quote: PriceQuote) -> PriceQuote {
        let now = self.clock.now();
        quote.expires_at = Some(now + self.ttl);
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, cached| cached.expires_at.map_or(false, |at| at > now));
                let purged = before - entries.len();
                if purged > 0 {
                    debug!(purged, "Dropped expired prices");
                }
                entries.insert(key, quote.clone());
            }
            Err(_) => warn!("Price cache lock poisoned, dropping write"),
        }
        quote
    }
}
