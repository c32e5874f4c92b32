//! In-memory market quote cache.
//!
//! Shared mutable state read by every interactive request and every
//! scheduler tick. Safe under concurrent access because refreshes swap
//! the whole map at once; readers only ever see a complete snapshot,
//! never a half-updated one.

use crate::types::Quote;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

/// Static fallback quotes so the cache never starts empty, even if the
/// quote source is unreachable at boot.
pub const FALLBACK_QUOTES: &[(&str, Quote)] = &[
    ("bitcoin", Quote { price: 62_450.0, change_24h: 1.2 }),
    ("ethereum", Quote { price: 3_250.0, change_24h: 0.8 }),
    ("solana", Quote { price: 145.2, change_24h: 2.4 }),
    ("cardano", Quote { price: 0.45, change_24h: -0.6 }),
    ("dogecoin", Quote { price: 0.12, change_24h: -1.1 }),
    ("litecoin", Quote { price: 92.45, change_24h: -0.5 }),
];

/// Whole-value-swapped quote cache. `get`/`get_all` never perform I/O.
pub struct PriceCache {
    quotes: RwLock<Arc<HashMap<String, Quote>>>,
    /// Epoch millis of the last successful refresh, 0 = never.
    last_refresh: AtomicI64,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceCache {
    /// Create a cache seeded from the fallback table.
    pub fn new() -> Self {
        let seed: HashMap<String, Quote> = FALLBACK_QUOTES
            .iter()
            .map(|(id, quote)| (id.to_string(), *quote))
            .collect();
        Self {
            quotes: RwLock::new(Arc::new(seed)),
            last_refresh: AtomicI64::new(0),
        }
    }

    /// Replace the entire cache with a fresh snapshot. Called only by
    /// the quote source after a successful fetch; partial updates are
    /// deliberately impossible.
    pub fn replace_all(&self, quotes: HashMap<String, Quote>) {
        let snapshot = Arc::new(quotes);
        *self.quotes.write().unwrap() = snapshot;
        self.last_refresh
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Current quote for one instrument. Unknown instruments fall back
    /// to the static table before reporting not-found.
    pub fn get(&self, coin_id: &str) -> Option<Quote> {
        let id = coin_id.to_lowercase();
        if let Some(quote) = self.quotes.read().unwrap().get(&id) {
            return Some(*quote);
        }
        FALLBACK_QUOTES
            .iter()
            .find(|(fallback_id, _)| *fallback_id == id)
            .map(|(_, quote)| *quote)
    }

    /// Snapshot of all cached quotes. Cheap: clones an Arc, not the map.
    pub fn get_all(&self) -> Arc<HashMap<String, Quote>> {
        self.quotes.read().unwrap().clone()
    }

    /// Epoch millis of the last successful refresh, if any.
    pub fn last_refresh_at(&self) -> Option<i64> {
        match self.last_refresh.load(Ordering::Relaxed) {
            0 => None,
            ts => Some(ts),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_is_seeded_from_fallbacks() {
        let cache = PriceCache::new();
        let btc = cache.get("bitcoin").unwrap();
        assert_eq!(btc.price, 62_450.0);
        assert!(cache.last_refresh_at().is_none());
    }

    #[test]
    fn test_replace_all_swaps_wholesale() {
        let cache = PriceCache::new();
        let before = cache.get_all();

        let mut fresh = HashMap::new();
        fresh.insert("bitcoin".to_string(), Quote::new(70_000.0, 3.0));
        cache.replace_all(fresh);

        assert_eq!(cache.get("bitcoin").unwrap().price, 70_000.0);
        assert!(cache.last_refresh_at().is_some());
        // The old snapshot is untouched for anyone still holding it.
        assert_eq!(before.get("bitcoin").unwrap().price, 62_450.0);
    }

    #[test]
    fn test_unknown_instrument_uses_fallback_table() {
        let cache = PriceCache::new();
        // Wipe the cache of everything but one coin.
        let mut fresh = HashMap::new();
        fresh.insert("bitcoin".to_string(), Quote::new(70_000.0, 3.0));
        cache.replace_all(fresh);

        // Litecoin fell out of the refresh but lives in the fallback table.
        let ltc = cache.get("litecoin").unwrap();
        assert_eq!(ltc.price, 92.45);

        // Entirely unknown instruments report not-found.
        assert!(cache.get("shiba-inu").is_none());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let cache = PriceCache::new();
        assert!(cache.get("BITCOIN").is_some());
    }
}
