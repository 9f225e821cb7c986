//! Tests for [`ResultCache`]: TTL expiry, capacity and counters.

use std::time::Duration;

use geofacade::cache::{CacheEntry, CacheKey, CachedPayload, ResultCache};
use geofacade::{CacheSettings, Coordinates, GeocodingOptions, GeocodingResult};

fn settings(max_entries: u64, duration_secs: u64) -> CacheSettings {
    CacheSettings {
        enabled: true,
        duration_secs,
        max_entries,
        ..CacheSettings::default()
    }
}

fn key(address: &str) -> CacheKey {
    CacheKey::geocode(address, &GeocodingOptions::default())
}

fn entry(name: &str, ttl: Duration) -> CacheEntry {
    let result = GeocodingResult::new(Coordinates::new(1.0, 2.0), name, "test");
    CacheEntry::new(CachedPayload::Geocode(vec![result]), "test", ttl)
}

#[test]
fn cache_miss_returns_none() {
    let cache = ResultCache::new(&settings(10, 60));
    assert!(cache.get(&key("nowhere"), "geocode").is_none());
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn insert_then_get() {
    let cache = ResultCache::new(&settings(10, 60));
    cache.insert(&key("Paris"), entry("Paris", Duration::from_secs(60)));

    let got = cache.get(&key("  paris "), "geocode").unwrap();
    assert_eq!(got.provider, "test");
    match got.payload {
        CachedPayload::Geocode(results) => assert_eq!(results[0].display_name, "Paris"),
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn entries_expire_after_their_ttl() {
    let cache = ResultCache::new(&settings(10, 60));
    cache.insert(&key("short"), entry("short", Duration::from_millis(100)));
    cache.insert(&key("long"), entry("long", Duration::from_secs(60)));

    std::thread::sleep(Duration::from_millis(250));

    // expiry is observed on read, no prune needed
    assert!(cache.get(&key("short"), "geocode").is_none());
    assert!(cache.get(&key("long"), "geocode").is_some());
}

#[test]
fn overwrite_resets_ttl() {
    let cache = ResultCache::new(&settings(10, 60));
    cache.insert(&key("x"), entry("first", Duration::from_millis(100)));
    cache.insert(&key("x"), entry("second", Duration::from_secs(60)));

    std::thread::sleep(Duration::from_millis(250));
    assert!(cache.get(&key("x"), "geocode").is_some());
}

#[test]
fn prune_bounds_the_entry_count() {
    let cache = ResultCache::new(&settings(3, 60));
    for i in 0..20 {
        let name = format!("place {i}");
        cache.insert(&key(&name), entry(&name, Duration::from_secs(60)));
    }
    cache.prune();

    let stats = cache.stats();
    assert!(stats.entries <= 3, "{} entries over capacity", stats.entries);
    assert_eq!(stats.max_entries, 3);
}

#[test]
fn insert_beyond_capacity_evicts_without_prune() {
    let cache = ResultCache::new(&settings(3, 60));
    for name in ["k0", "k1", "k2", "k3"] {
        cache.insert(&key(name), entry(name, Duration::from_secs(60)));
    }

    let readable = ["k0", "k1", "k2", "k3"]
        .iter()
        .filter(|name| cache.get(&key(name), "geocode").is_some())
        .count();
    assert_eq!(readable, 3);
    assert_eq!(cache.stats().entries, 3);
}

#[test]
fn least_recently_used_entry_is_evicted() {
    let cache = ResultCache::new(&settings(3, 60));
    for name in ["a", "b", "c"] {
        cache.insert(&key(name), entry(name, Duration::from_secs(60)));
    }
    assert!(cache.get(&key("a"), "geocode").is_some());
    cache.insert(&key("d"), entry("d", Duration::from_secs(60)));
    cache.prune();

    let present: Vec<bool> = ["a", "b", "c", "d"]
        .iter()
        .map(|name| cache.get(&key(name), "geocode").is_some())
        .collect();
    assert_eq!(present, [true, false, true, true]);
}

#[test]
fn disabled_cache_stores_nothing() {
    let cache = ResultCache::disabled();
    cache.insert(&key("Paris"), entry("Paris", Duration::from_secs(60)));

    assert!(cache.get(&key("Paris"), "geocode").is_none());
    let stats = cache.stats();
    assert!(!stats.enabled);
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.misses, 0);
}

#[test]
fn clear_drops_entries_and_counters() {
    let cache = ResultCache::new(&settings(10, 60));
    cache.insert(&key("a"), entry("a", Duration::from_secs(60)));
    cache.get(&key("a"), "geocode");
    cache.get(&key("b"), "geocode");

    cache.clear();

    let stats = cache.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.hits, 0);
    assert_eq!(stats.misses, 0);
    assert!(cache.get(&key("a"), "geocode").is_none());
}

#[test]
fn hit_ratio_counts_hits_over_lookups() {
    let cache = ResultCache::new(&settings(10, 60));
    assert_eq!(cache.stats().hit_ratio(), 0.0);

    cache.insert(&key("a"), entry("a", Duration::from_secs(60)));
    cache.get(&key("a"), "geocode");
    cache.get(&key("a"), "geocode");
    cache.get(&key("a"), "geocode");
    cache.get(&key("b"), "geocode");

    assert_eq!(cache.stats().hit_ratio(), 0.75);
}
