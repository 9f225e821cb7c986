//! The geocoding facade.
//!
//! # Request flow
//!
//! ```text
//! geocode("Paris")
//!       │
//!       ├─ validate input ───────────────────────────► InvalidInput / InvalidCoordinates
//!       ├─ cache lookup ─────────────────────────────► hit: return
//!       ├─ offline-restricted? ──────────────────────► OfflineRestricted
//!       ▼
//!  RequestDeduplicator (one producer per key)
//!       │
//!       ├─ re-check cache
//!       ├─ ProviderSelector ─────────────────────────► QuotaExceeded / NoProvider
//!       ▼
//!  for each candidate: attempt under timeout
//!       ├─ ok:  cache, count quota, return
//!       └─ err: warn, next candidate ────────────────► all failed: first error
//! ```
//!
//! Provider clients, the result cache and the settings they were built from
//! live together in an immutable `State` behind `RwLock<Arc<_>>`.
//! [`GeocodingService::reconfigure`] builds a new `State` and swaps it in, so
//! a request sees either the old configuration or the new one, never a mix.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::builder::GeocodingServiceBuilder;
use super::status::ProviderStatus;
use super::task::TaskGuard;
use crate::cache::{
    CacheEntry, CacheKey, CacheStats, CachedPayload, DedupStats, RequestDeduplicator, ResultCache,
};
use crate::config::{ConfigStore, GeocodingSettings, ProviderSettings, SearchSettings};
use crate::error::ErrorCode;
use crate::health::{HealthMonitor, NetworkStatus};
use crate::providers::{
    GeocodingProvider, ProviderFactory, ProviderHandle, ProviderSelector, with_timeout,
};
use crate::telemetry;
use crate::types::{
    AutocompleteOptions, AutocompleteSuggestion, Capability, Coordinates, GeocodingOptions,
    GeocodingResult, ReverseGeocodingOptions, ReverseGeocodingResult, SearchCapabilities,
    SearchMode,
};
use crate::{GeocodingError, Result};

const GEOCODE: &str = "geocode";
const REVERSE_GEOCODE: &str = "reverse_geocode";
const AUTOCOMPLETE: &str = "autocomplete";

/// Unified geocoding API over several providers.
///
/// Cheap to clone; clones share caches, providers and in-flight requests.
/// Build one with [`GeocodingService::builder`].
#[derive(Clone)]
pub struct GeocodingService {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<dyn ConfigStore>,
    health: Arc<dyn HealthMonitor>,
    network: Arc<dyn NetworkStatus>,
    factory: Arc<dyn ProviderFactory>,
    state: RwLock<Arc<State>>,
    reconfiguring: Mutex<()>,
    inflight: RequestDeduplicator<CacheEntry>,
}

struct State {
    settings: GeocodingSettings,
    /// Built clients for enabled providers, in configured order.
    providers: Vec<ProviderHandle>,
    cache: Arc<ResultCache>,
}

/// A cacheable lookup, owned so it can move into the deduplicated producer.
enum Lookup {
    Forward {
        address: String,
        options: GeocodingOptions,
    },
    Reverse {
        coordinates: Coordinates,
        options: ReverseGeocodingOptions,
    },
}

impl Lookup {
    fn operation(&self) -> &'static str {
        match self {
            Lookup::Forward { .. } => GEOCODE,
            Lookup::Reverse { .. } => REVERSE_GEOCODE,
        }
    }

    fn capability(&self) -> Capability {
        match self {
            Lookup::Forward { .. } => Capability::Geocoding,
            Lookup::Reverse { .. } => Capability::ReverseGeocoding,
        }
    }

    fn preferred(&self) -> Option<&str> {
        match self {
            Lookup::Forward { options, .. } => options.provider.as_deref(),
            Lookup::Reverse { options, .. } => options.provider.as_deref(),
        }
    }

    async fn call(&self, provider: &dyn GeocodingProvider) -> Result<CachedPayload> {
        match self {
            Lookup::Forward { address, options } => provider
                .geocode(address, options)
                .await
                .map(CachedPayload::Geocode),
            Lookup::Reverse {
                coordinates,
                options,
            } => provider
                .reverse_geocode(*coordinates, options)
                .await
                .map(CachedPayload::Reverse),
        }
    }
}

impl GeocodingService {
    /// Create a builder. See [`GeocodingServiceBuilder`].
    pub fn builder() -> GeocodingServiceBuilder {
        GeocodingServiceBuilder::new()
    }

    /// Assemble a service and load the store's current settings.
    pub(crate) fn assemble(
        config: Arc<dyn ConfigStore>,
        health: Arc<dyn HealthMonitor>,
        network: Arc<dyn NetworkStatus>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Result<Self> {
        let empty = State {
            settings: GeocodingSettings {
                providers: Vec::new(),
                ..GeocodingSettings::default()
            },
            providers: Vec::new(),
            cache: Arc::new(ResultCache::disabled()),
        };
        let service = Self {
            inner: Arc::new(Inner {
                config,
                health,
                network,
                factory,
                state: RwLock::new(Arc::new(empty)),
                reconfiguring: Mutex::new(()),
                inflight: RequestDeduplicator::new(),
            }),
        };
        service.reconfigure()?;
        Ok(service)
    }

    // ========================================================================
    // Lookups
    // ========================================================================

    /// Forward geocode a free-form address.
    ///
    /// Fails with [`GeocodingError::InvalidInput`] for an empty address,
    /// [`GeocodingError::OfflineRestricted`] on a cache miss while offline,
    /// an availability error when no provider is eligible, or the first
    /// provider error when every candidate failed.
    #[instrument(skip(self, options), fields(operation = GEOCODE))]
    pub async fn geocode(
        &self,
        address: &str,
        options: &GeocodingOptions,
    ) -> Result<Vec<GeocodingResult>> {
        let address = address.trim();
        if address.is_empty() {
            return Err(GeocodingError::InvalidInput(
                "address must not be empty".to_string(),
            ));
        }

        let key = CacheKey::geocode(address, options);
        let lookup = Lookup::Forward {
            address: address.to_owned(),
            options: options.clone(),
        };
        match self.inner.fetch(key, lookup).await?.payload {
            CachedPayload::Geocode(results) => Ok(results),
            CachedPayload::Reverse(_) => Err(payload_mismatch()),
        }
    }

    /// Resolve coordinates to an address.
    ///
    /// Out-of-range coordinates fail with
    /// [`GeocodingError::InvalidCoordinates`] before any provider is
    /// contacted.
    #[instrument(skip(self, options), fields(operation = REVERSE_GEOCODE))]
    pub async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
        options: &ReverseGeocodingOptions,
    ) -> Result<ReverseGeocodingResult> {
        coordinates.validate()?;

        let key = CacheKey::reverse(&coordinates, options);
        let lookup = Lookup::Reverse {
            coordinates,
            options: options.clone(),
        };
        match self.inner.fetch(key, lookup).await?.payload {
            CachedPayload::Reverse(result) => Ok(result),
            CachedPayload::Geocode(_) => Err(payload_mismatch()),
        }
    }

    /// Type-ahead suggestions.
    ///
    /// Never fails: an empty query, a search mode other than
    /// [`SearchMode::OnlineAutocomplete`], or failure of every candidate all
    /// yield an empty list. Results are not cached.
    #[instrument(skip(self, options), fields(operation = AUTOCOMPLETE))]
    pub async fn autocomplete(
        &self,
        query: &str,
        options: &AutocompleteOptions,
    ) -> Vec<AutocompleteSuggestion> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let state = self.inner.current();
        let preferred = options.provider.as_deref();
        let capabilities = self.inner.capabilities_for(&state, preferred);
        if capabilities.mode != SearchMode::OnlineAutocomplete {
            debug!(mode = ?capabilities.mode, reason = ?capabilities.reason, "autocomplete unavailable");
            return Vec::new();
        }

        let candidates = self.inner.autocomplete_candidates(&state, preferred);
        let timeout = state.settings.search.request_timeout();
        let geocoding_options = options.as_geocoding();

        let attempts = candidates.len();
        for (index, handle) in candidates.into_iter().enumerate() {
            let name = handle.name();
            let provider = handle.provider.as_ref();
            let native = handle.supports(Capability::Autocomplete);
            let start = Instant::now();
            let attempt = async {
                if native {
                    provider.autocomplete(query, options).await
                } else {
                    provider
                        .geocode(query, &geocoding_options)
                        .await
                        .map(|results| results.into_iter().map(Into::into).collect())
                }
            };

            match with_timeout(name, AUTOCOMPLETE, timeout, attempt).await {
                Ok(mut suggestions) => {
                    record_attempt(AUTOCOMPLETE, name, start, true);
                    self.inner.config.increment_quota(name);
                    if let Some(limit) = options.limit {
                        suggestions.truncate(limit);
                    }
                    return suggestions;
                }
                Err(e) => {
                    record_attempt(AUTOCOMPLETE, name, start, false);
                    if index + 1 < attempts {
                        record_fallback(AUTOCOMPLETE, name);
                    }
                    warn!(provider = name, operation = AUTOCOMPLETE, error = %e, "provider attempt failed");
                }
            }
        }
        Vec::new()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// How a search box should behave right now. Performs no I/O.
    ///
    /// `preferred` only affects the order of the returned provider names.
    pub fn search_capabilities(&self, preferred: Option<&str>) -> SearchCapabilities {
        let state = self.inner.current();
        self.inner.capabilities_for(&state, preferred)
    }

    /// Status of every configured provider, in configured order.
    pub fn provider_status(&self) -> Vec<ProviderStatus> {
        let state = self.inner.current();
        let config = &self.inner.config;
        state
            .settings
            .providers
            .iter()
            .map(|settings| {
                let name = settings.name.as_str();
                let handle = state.providers.iter().find(|h| h.name() == name);
                ProviderStatus {
                    name: name.to_owned(),
                    kind: settings.kind,
                    enabled: settings.enabled,
                    active: handle.is_some(),
                    capabilities: handle.map_or_else(
                        || settings.effective_capabilities(),
                        |h| h.provider.capabilities(),
                    ),
                    health: self.inner.health.provider_health(name),
                    quota_usage: config.quota_usage(name),
                    quota_limits: state.settings.quota_limits(name),
                    quota_exceeded: config.is_quota_exceeded(name),
                    has_api_key: config.active_api_key(name).is_some(),
                }
            })
            .collect()
    }

    /// Online (or not offline-restricted) with at least one provider eligible
    /// for geocoding.
    pub fn is_available(&self) -> bool {
        let state = self.inner.current();
        if self.inner.offline_restricted(&state.settings) {
            return false;
        }
        !self
            .inner
            .selector(&state)
            .assess(Capability::Geocoding, |_| false)
            .eligible
            .is_empty()
    }

    /// Drop every cached response and reset hit/miss counters.
    pub fn clear_cache(&self) {
        self.inner.current().cache.clear();
        info!("geocoding cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.current().cache.stats()
    }

    pub fn dedup_stats(&self) -> DedupStats {
        self.inner.inflight.stats()
    }

    /// Snapshot of the settings currently in effect.
    pub fn settings(&self) -> GeocodingSettings {
        self.inner.current().settings.clone()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Re-read the config store and rebuild what changed.
    ///
    /// Provider clients whose signature is unchanged are reused. The cache is
    /// rebuilt only when cache settings change. Invalid settings are rejected
    /// and the previous state stays in effect.
    pub fn reconfigure(&self) -> Result<()> {
        self.inner.reconfigure()
    }

    /// Reconfigure on every config store change until the guard is dropped.
    pub fn subscribe_to_config(&self) -> TaskGuard {
        let mut changes = self.inner.config.subscribe();
        let inner = Arc::downgrade(&self.inner);
        TaskGuard::spawn(async move {
            while changes.changed().await.is_ok() {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if let Err(e) = inner.reconfigure() {
                    warn!(error = %e, "configuration change rejected, keeping previous settings");
                }
            }
        })
    }

    /// Prune expired cache entries periodically until the guard is dropped.
    ///
    /// The interval is read from the cache settings in effect at spawn time.
    pub fn spawn_cache_pruner(&self) -> TaskGuard {
        let period = self.inner.current().settings.cache.prune_interval();
        let inner = Arc::downgrade(&self.inner);
        TaskGuard::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.current().cache.prune();
            }
        })
    }
}

impl Inner {
    fn current(&self) -> Arc<State> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn selector<'a>(&'a self, state: &'a State) -> ProviderSelector<'a> {
        ProviderSelector::new(&state.providers, self.config.as_ref(), self.health.as_ref())
    }

    fn offline_restricted(&self, settings: &GeocodingSettings) -> bool {
        settings.search.offline_mode && !self.network.is_online()
    }

    /// Cache, then dedup, then the provider chain.
    async fn fetch(self: &Arc<Self>, key: CacheKey, lookup: Lookup) -> Result<CacheEntry> {
        let operation = lookup.operation();
        let state = self.current();
        if let Some(entry) = state.cache.get(&key, operation) {
            return Ok(entry);
        }
        if self.offline_restricted(&state.settings) {
            debug!(operation, "offline-restricted cache miss");
            return Err(GeocodingError::OfflineRestricted);
        }
        drop(state);

        let inner = Arc::clone(self);
        let dedup_key = key.as_str().to_owned();
        self.inflight
            .dedupe(&dedup_key, async move { inner.produce(key, lookup).await })
            .await
    }

    /// Runs at most once per key at a time.
    async fn produce(&self, key: CacheKey, lookup: Lookup) -> Result<CacheEntry> {
        let operation = lookup.operation();
        let state = self.current();
        if let Some(entry) = state.cache.peek(&key) {
            debug!(operation, "served from cache after coalescing");
            return Ok(entry);
        }

        let candidates = self.selector(&state).select(
            lookup.capability(),
            lookup.preferred(),
            state.settings.search.auto_fallback,
            |_| false,
        )?;
        let timeout = state.settings.search.request_timeout();

        let mut first_error = None;
        let attempts = candidates.len();
        for (index, handle) in candidates.into_iter().enumerate() {
            let name = handle.name();
            let start = Instant::now();
            match with_timeout(name, operation, timeout, lookup.call(handle.provider.as_ref())).await
            {
                Ok(payload) => {
                    record_attempt(operation, name, start, true);
                    self.config.increment_quota(name);
                    // TTL and cache come from the configuration current at insertion
                    let now = self.current();
                    let entry = CacheEntry::new(payload, name, now.settings.cache.ttl());
                    now.cache.insert(&key, entry.clone());
                    return Ok(entry);
                }
                Err(e) => {
                    record_attempt(operation, name, start, false);
                    if index + 1 < attempts {
                        record_fallback(operation, name);
                    }
                    warn!(provider = name, operation, error = %e, "provider attempt failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or(GeocodingError::NoProvider))
    }

    fn autocomplete_candidates(&self, state: &State, preferred: Option<&str>) -> Vec<ProviderHandle> {
        let search = &state.settings.search;
        let selector = self.selector(state);
        let assessment = selector.assess_where(
            |h| h.supports(Capability::Autocomplete) || h.supports(Capability::Geocoding),
            |h| search.is_policy_restricted(h.name()),
        );
        selector.order(assessment.eligible, preferred, search.auto_fallback)
    }

    fn capabilities_for(&self, state: &State, preferred: Option<&str>) -> SearchCapabilities {
        if self.offline_restricted(&state.settings) {
            return SearchCapabilities {
                mode: SearchMode::OfflineCache,
                reason: Some(ErrorCode::OfflineRestricted),
                providers: Vec::new(),
            };
        }

        let search = &state.settings.search;
        let selector = self.selector(state);
        let names = |handles: Vec<ProviderHandle>| {
            handles
                .iter()
                .map(|h| h.name().to_owned())
                .collect::<Vec<_>>()
        };

        let autocomplete = selector.assess(Capability::Autocomplete, |h| {
            search.is_policy_restricted(h.name())
        });
        if !autocomplete.eligible.is_empty() {
            return SearchCapabilities {
                mode: SearchMode::OnlineAutocomplete,
                reason: None,
                providers: names(self.autocomplete_candidates(state, preferred)),
            };
        }

        let geocoding = selector.assess(Capability::Geocoding, |_| false);
        if !geocoding.eligible.is_empty() {
            let reason = if autocomplete.policy_excluded > 0 {
                ErrorCode::PolicyRestricted
            } else if autocomplete.quota_excluded > 0 {
                ErrorCode::QuotaExceeded
            } else {
                ErrorCode::NoProvider
            };
            return SearchCapabilities {
                mode: SearchMode::SubmitSearch,
                reason: Some(reason),
                providers: names(selector.order(
                    geocoding.eligible,
                    preferred,
                    search.auto_fallback,
                )),
            };
        }

        let reason = if geocoding.quota_excluded > 0 || autocomplete.quota_excluded > 0 {
            ErrorCode::QuotaExceeded
        } else if autocomplete.policy_excluded > 0 {
            ErrorCode::PolicyRestricted
        } else {
            ErrorCode::NoProvider
        };
        SearchCapabilities {
            mode: SearchMode::Disabled,
            reason: Some(reason),
            providers: Vec::new(),
        }
    }

    fn reconfigure(&self) -> Result<()> {
        let _serialized = self
            .reconfiguring
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let settings = self.config.settings();
        settings.validate()?;
        let previous = self.current();
        let timeout = settings.search.request_timeout();

        let mut providers = Vec::with_capacity(settings.providers.len());
        for provider_settings in settings.providers.iter().filter(|p| p.enabled) {
            let name = provider_settings.name.as_str();
            let api_key = self.config.active_api_key(name);
            let signature = provider_signature(provider_settings, api_key.as_deref(), &settings.search);

            if let Some(existing) = previous
                .providers
                .iter()
                .find(|h| h.name() == name && h.signature == signature)
            {
                providers.push(existing.clone());
                continue;
            }

            match self
                .factory
                .create(provider_settings, api_key.as_deref(), timeout)
            {
                Ok(provider) => providers.push(ProviderHandle {
                    provider,
                    settings: provider_settings.clone(),
                    signature,
                }),
                Err(e) => {
                    warn!(provider = name, error = %e, "provider left inactive");
                }
            }
        }

        let interval = settings.search.health_check_interval();
        if interval != previous.settings.search.health_check_interval() {
            self.health.set_probe_interval(interval);
        }

        for stale in previous
            .providers
            .iter()
            .filter(|&h| !is_retained(h, &providers))
        {
            self.health.stop_monitoring(stale.name());
        }
        for fresh in providers
            .iter()
            .filter(|&h| !is_retained(h, &previous.providers))
        {
            self.health.start_monitoring(Arc::clone(&fresh.provider));
        }

        let cache = if previous.cache.settings() == &settings.cache {
            Arc::clone(&previous.cache)
        } else {
            debug!(enabled = settings.cache.enabled, max_entries = settings.cache.max_entries, "rebuilding result cache");
            Arc::new(ResultCache::new(&settings.cache))
        };

        info!(
            providers = providers.len(),
            configured = settings.providers.len(),
            cache_enabled = cache.is_enabled(),
            "geocoding service configured"
        );
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(State {
            settings,
            providers,
            cache,
        });
        Ok(())
    }
}

/// Same name and signature present in `set`.
fn is_retained(handle: &ProviderHandle, set: &[ProviderHandle]) -> bool {
    set.iter()
        .any(|h| h.name() == handle.name() && h.signature == handle.signature)
}

/// Hash of everything a provider client is built from.
fn provider_signature(
    settings: &ProviderSettings,
    api_key: Option<&str>,
    search: &SearchSettings,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    settings.hash(&mut hasher);
    api_key.hash(&mut hasher);
    search.request_timeout_ms.hash(&mut hasher);
    hasher.finish()
}

fn payload_mismatch() -> GeocodingError {
    GeocodingError::Decode("cached payload does not match the operation".to_string())
}

fn record_attempt(operation: &'static str, provider: &str, start: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "provider" => provider.to_owned(),
        "operation" => operation,
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "provider" => provider.to_owned(),
        "operation" => operation,
    )
    .record(start.elapsed().as_secs_f64());
}

fn record_fallback(operation: &'static str, provider: &str) {
    metrics::counter!(telemetry::FALLBACKS_TOTAL,
        "provider" => provider.to_owned(),
        "operation" => operation,
    )
    .increment(1);
}
