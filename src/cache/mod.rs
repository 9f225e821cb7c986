//! Caching subsystem.
//!
//! Two cooperating pieces sit in front of the provider fallback chain:
//!
//! - [`ResultCache`]: LRU-bounded cache of geocode / reverse-geocode
//!   responses. Every entry carries its own TTL, fixed at insertion from the
//!   settings current at that moment, so reconfiguration never stretches or
//!   shortens what is already cached.
//!
//! - [`inflight::RequestDeduplicator`]: collapses concurrent identical
//!   requests into one provider call. Keys are the same [`CacheKey`]s the
//!   result cache uses.

pub mod inflight;

pub use inflight::{DedupStats, RequestDeduplicator};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use serde::Serialize;
use tracing::debug;

use crate::config::CacheSettings;
use crate::telemetry;
use crate::types::{
    Coordinates, GeocodingOptions, GeocodingResult, ReverseGeocodingOptions,
    ReverseGeocodingResult,
};

/// Cached response value.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedPayload {
    Geocode(Vec<GeocodingResult>),
    Reverse(ReverseGeocodingResult),
}

/// A cached response plus the provider that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: CachedPayload,
    pub provider: String,
    /// Lifetime of this entry, counted from insertion.
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(payload: CachedPayload, provider: impl Into<String>, ttl: Duration) -> Self {
        Self {
            payload,
            provider: provider.into(),
            ttl,
        }
    }
}

/// Deterministic request key: operation, normalized input and sorted options.
///
/// Serialized as compact JSON over a `BTreeMap`, so option order in the
/// request never changes the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

#[derive(Serialize)]
struct KeyParts<'a> {
    op: &'a str,
    input: &'a str,
    options: BTreeMap<&'static str, String>,
}

impl CacheKey {
    fn build(op: &str, input: &str, pairs: Vec<(&'static str, String)>) -> Self {
        let parts = KeyParts {
            op,
            input,
            options: pairs.into_iter().collect(),
        };
        // Serializing strings and a string map cannot fail
        let json = serde_json::to_string(&parts).unwrap_or_else(|_| format!("{op}|{input}"));
        Self(json)
    }

    /// Key for a forward geocode. The address is trimmed, lowercased and
    /// whitespace-collapsed.
    pub fn geocode(address: &str, options: &GeocodingOptions) -> Self {
        Self::build("geocode", &normalize_query(address), options.key_pairs())
    }

    /// Key for a reverse geocode. Coordinates are rounded to 6 decimals
    /// (about 0.1 m).
    pub fn reverse(coords: &Coordinates, options: &ReverseGeocodingOptions) -> Self {
        let input = format!("{:.6},{:.6}", coords.latitude, coords.longitude);
        Self::build("reverse", &input, options.key_pairs())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub(crate) fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Expiry policy reading the TTL stored in each entry.
struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub entries: u64,
    pub max_entries: u64,
    pub hits: u64,
    pub misses: u64,
    /// TTL given to new entries, in seconds.
    pub ttl_secs: u64,
}

impl CacheStats {
    /// Hit ratio in `[0, 1]`; 0 before any lookup.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// In-memory LRU + per-entry TTL cache of provider responses.
///
/// When constructed from disabled settings no moka cache is allocated:
/// `get` always misses and `insert` does nothing.
pub struct ResultCache {
    cache: Option<Cache<String, CacheEntry>>,
    settings: CacheSettings,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    pub fn new(settings: &CacheSettings) -> Self {
        let cache = settings.enabled.then(|| {
            Cache::builder()
                .max_capacity(settings.max_entries)
                .eviction_policy(EvictionPolicy::lru())
                .expire_after(EntryTtl)
                .build()
        });
        Self {
            cache,
            settings: settings.clone(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(&CacheSettings {
            enabled: false,
            ..CacheSettings::default()
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Settings this cache was built from.
    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Look up `key`. Expired entries are misses.
    pub fn get(&self, key: &CacheKey, operation: &'static str) -> Option<CacheEntry> {
        let cache = self.cache.as_ref()?;
        match cache.get(key.as_str()) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "operation" => operation)
                    .increment(1);
                debug!(operation, provider = %entry.provider, "cache hit");
                Some(entry)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "operation" => operation)
                    .increment(1);
                None
            }
        }
    }

    /// Look up `key` without touching hit/miss counters.
    pub(crate) fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.cache.as_ref()?.get(key.as_str())
    }

    /// Insert (or overwrite) an entry. Its TTL is taken from `entry.ttl`.
    ///
    /// Eviction runs before returning, so the cache never holds more than
    /// `max_entries` once an insert completes.
    pub fn insert(&self, key: &CacheKey, entry: CacheEntry) {
        if let Some(cache) = &self.cache {
            cache.insert(key.as_str().to_owned(), entry);
            cache.run_pending_tasks();
        }
    }

    /// Drop expired entries and apply pending evictions now.
    pub fn prune(&self) {
        if let Some(cache) = &self.cache {
            cache.run_pending_tasks();
        }
    }

    /// Evict all entries and reset counters.
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
            cache.run_pending_tasks();
        }
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            enabled: self.is_enabled(),
            entries: self.cache.as_ref().map_or(0, |c| c.entry_count()),
            max_entries: self.settings.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ttl_secs: self.settings.duration_secs,
        }
    }
}
