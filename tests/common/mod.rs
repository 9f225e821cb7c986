//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use geofacade::config::{ConfigStore, InMemoryConfigStore};
use geofacade::{
    AutocompleteOptions, AutocompleteSuggestion, Coordinates, GeocodingError, GeocodingOptions,
    GeocodingProvider, GeocodingResult, GeocodingService, GeocodingSettings, HealthMonitor,
    NetworkState, ProviderCapabilities, ProviderFactory, ProviderHealth, ProviderKind,
    ProviderSettings, Result, ReverseGeocodingOptions, ReverseGeocodingResult,
};

// ============================================================================
// Mock provider
// ============================================================================

/// Scriptable provider that counts calls.
pub struct MockProvider {
    name: String,
    capabilities: ProviderCapabilities,
    delay: Duration,
    failure: Mutex<Option<GeocodingError>>,
    calls: AtomicUsize,
    autocomplete_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            capabilities: ProviderCapabilities::full(),
            delay: Duration::ZERO,
            failure: Mutex::new(None),
            calls: AtomicUsize::new(0),
            autocomplete_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(self, error: GeocodingError) -> Self {
        self.set_failure(Some(error));
        self
    }

    pub fn set_failure(&self, error: Option<GeocodingError>) {
        *self.failure.lock().unwrap() = error;
    }

    /// Total calls to any lookup method.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls to the native `autocomplete` method only.
    pub fn autocomplete_calls(&self) -> usize {
        self.autocomplete_calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GeocodingProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderKind {
        ProviderKind::OpenStreetMap
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn geocode(
        &self,
        address: &str,
        options: &GeocodingOptions,
    ) -> Result<Vec<GeocodingResult>> {
        self.enter().await?;
        let count = options.limit.unwrap_or(3);
        Ok((0..count)
            .map(|i| {
                GeocodingResult::new(
                    Coordinates::new(48.85 + i as f64 * 0.01, 2.35),
                    format!("{address} #{i} ({})", self.name),
                    &self.name,
                )
            })
            .collect())
    }

    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
        _options: &ReverseGeocodingOptions,
    ) -> Result<ReverseGeocodingResult> {
        self.enter().await?;
        Ok(ReverseGeocodingResult {
            coordinates,
            display_name: format!("near {},{}", coordinates.latitude, coordinates.longitude),
            address: Default::default(),
            provider: self.name.clone(),
        })
    }

    async fn autocomplete(
        &self,
        query: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<AutocompleteSuggestion>> {
        if !self.capabilities.autocomplete {
            return Err(GeocodingError::Unsupported);
        }
        self.autocomplete_calls.fetch_add(1, Ordering::SeqCst);
        self.enter().await?;
        let count = options.limit.unwrap_or(5) + 2;
        Ok((0..count)
            .map(|i| AutocompleteSuggestion {
                display_name: format!("{query}{i}"),
                coordinates: None,
                place_id: Some(format!("{}-{i}", self.name)),
                place_type: None,
                provider: self.name.clone(),
            })
            .collect())
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Hands out pre-built mocks by provider name and counts constructions.
#[derive(Default)]
pub struct MockFactory {
    providers: Mutex<HashMap<String, Arc<MockProvider>>>,
    created: Mutex<HashMap<String, usize>>,
}

impl MockFactory {
    pub fn new(providers: &[Arc<MockProvider>]) -> Self {
        let factory = Self::default();
        for provider in providers {
            factory.add(Arc::clone(provider));
        }
        factory
    }

    pub fn add(&self, provider: Arc<MockProvider>) {
        self.providers
            .lock()
            .unwrap()
            .insert(provider.name().to_string(), provider);
    }

    pub fn created(&self, name: &str) -> usize {
        self.created.lock().unwrap().get(name).copied().unwrap_or(0)
    }
}

impl ProviderFactory for MockFactory {
    fn create(
        &self,
        settings: &ProviderSettings,
        _api_key: Option<&str>,
        _timeout: Duration,
    ) -> Result<Arc<dyn GeocodingProvider>> {
        let provider = self
            .providers
            .lock()
            .unwrap()
            .get(&settings.name)
            .cloned()
            .ok_or_else(|| GeocodingError::Configuration(format!("no mock for {}", settings.name)))?;
        *self
            .created
            .lock()
            .unwrap()
            .entry(settings.name.clone())
            .or_default() += 1;
        Ok(provider)
    }
}

// ============================================================================
// Health
// ============================================================================

/// Health monitor whose answers are set by the test.
#[derive(Default)]
pub struct StaticHealth {
    records: Mutex<HashMap<String, ProviderHealth>>,
    recommended: Mutex<Option<String>>,
    started: Mutex<Vec<String>>,
    stopped: Mutex<Vec<String>>,
    intervals: Mutex<Vec<Duration>>,
}

impl StaticHealth {
    pub fn set_unhealthy(&self, name: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(name.to_string(), ProviderHealth::unhealthy("down", 3));
    }

    pub fn set_healthy(&self, name: &str) {
        self.records
            .lock()
            .unwrap()
            .insert(name.to_string(), ProviderHealth::healthy(Some(Duration::from_millis(10))));
    }

    pub fn recommend(&self, name: Option<&str>) {
        *self.recommended.lock().unwrap() = name.map(str::to_string);
    }

    pub fn started(&self) -> Vec<String> {
        self.started.lock().unwrap().clone()
    }

    pub fn stopped(&self) -> Vec<String> {
        self.stopped.lock().unwrap().clone()
    }

    pub fn intervals(&self) -> Vec<Duration> {
        self.intervals.lock().unwrap().clone()
    }
}

impl HealthMonitor for StaticHealth {
    fn start_monitoring(&self, provider: Arc<dyn GeocodingProvider>) {
        self.started.lock().unwrap().push(provider.name().to_string());
    }

    fn stop_monitoring(&self, name: &str) {
        self.stopped.lock().unwrap().push(name.to_string());
        self.records.lock().unwrap().remove(name);
    }

    fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        self.records.lock().unwrap().get(name).cloned()
    }

    fn recommended_provider(&self) -> Option<String> {
        self.recommended.lock().unwrap().clone()
    }

    fn set_probe_interval(&self, interval: Duration) {
        self.intervals.lock().unwrap().push(interval);
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Settings listing `names` as enabled providers, in order.
pub fn settings_for(names: &[&str]) -> GeocodingSettings {
    GeocodingSettings {
        providers: names
            .iter()
            .map(|name| ProviderSettings::new(*name, ProviderKind::OpenStreetMap))
            .collect(),
        ..GeocodingSettings::default()
    }
}

/// A service wired to mocks, with handles to every collaborator.
pub struct Harness {
    pub service: GeocodingService,
    pub store: Arc<InMemoryConfigStore>,
    pub health: Arc<StaticHealth>,
    pub network: Arc<NetworkState>,
    pub factory: Arc<MockFactory>,
}

impl Harness {
    pub fn new(settings: GeocodingSettings, providers: &[Arc<MockProvider>]) -> Self {
        let store = Arc::new(InMemoryConfigStore::new(settings));
        let health = Arc::new(StaticHealth::default());
        let network = Arc::new(NetworkState::default());
        let factory = Arc::new(MockFactory::new(providers));
        let service = GeocodingService::builder()
            .config_store(store.clone())
            .health_monitor(health.clone())
            .network_status(network.clone())
            .provider_factory(factory.clone())
            .build()
            .expect("service builds");
        Self {
            service,
            store,
            health,
            network,
            factory,
        }
    }

    pub fn daily_usage(&self, name: &str) -> u64 {
        self.store.quota_usage(name).daily
    }
}

pub fn mock(name: &str) -> Arc<MockProvider> {
    Arc::new(MockProvider::new(name))
}
