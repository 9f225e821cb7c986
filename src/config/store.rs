//! Configuration store abstraction and the in-memory implementation.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::watch;

use super::{GeocodingSettings, QuotaTracker, QuotaUsage};

/// Source of settings, API keys and quota state for the facade.
///
/// The facade never caches settings across a [`subscribe`](Self::subscribe)
/// notification; it re-reads [`settings`](Self::settings) and rebuilds.
pub trait ConfigStore: Send + Sync {
    /// Snapshot of the current settings.
    fn settings(&self) -> GeocodingSettings;

    /// Change notifications. The value is a version counter bumped on
    /// every settings or API key change.
    fn subscribe(&self) -> watch::Receiver<u64>;

    /// API key currently active for `provider`, if any.
    fn active_api_key(&self, provider: &str) -> Option<String>;

    /// Whether `provider` has reached its daily or monthly ceiling.
    fn is_quota_exceeded(&self, provider: &str) -> bool;

    /// Add one unit of usage after a successful provider call.
    fn increment_quota(&self, provider: &str);

    /// Current usage counters for `provider`.
    fn quota_usage(&self, provider: &str) -> QuotaUsage;
}

/// [`ConfigStore`] backed by process memory.
pub struct InMemoryConfigStore {
    settings: RwLock<GeocodingSettings>,
    api_keys: RwLock<HashMap<String, String>>,
    quota: QuotaTracker,
    version: watch::Sender<u64>,
}

impl InMemoryConfigStore {
    pub fn new(settings: GeocodingSettings) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            settings: RwLock::new(settings),
            api_keys: RwLock::new(HashMap::new()),
            quota: QuotaTracker::new(),
            version,
        }
    }

    /// Attach an API key at construction time (no notification).
    pub fn with_api_key(self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(provider.into(), key.into());
        self
    }

    /// Mutate settings in place and notify subscribers.
    pub fn update(&self, f: impl FnOnce(&mut GeocodingSettings)) {
        {
            let mut settings = self.settings.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut settings);
        }
        self.notify();
    }

    /// Replace settings wholesale and notify subscribers.
    pub fn replace(&self, settings: GeocodingSettings) {
        self.update(|s| *s = settings);
    }

    /// Set or clear the active API key for `provider` and notify subscribers.
    pub fn set_api_key(&self, provider: impl Into<String>, key: Option<String>) {
        {
            let mut keys = self.api_keys.write().unwrap_or_else(PoisonError::into_inner);
            let provider = provider.into();
            match key {
                Some(key) => keys.insert(provider, key),
                None => keys.remove(&provider),
            };
        }
        self.notify();
    }

    /// Direct access to the usage tracker.
    pub fn quota_tracker(&self) -> &QuotaTracker {
        &self.quota
    }

    /// Current version counter.
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    fn notify(&self) {
        // send_modify updates the value even with no live receivers
        self.version.send_modify(|v| *v += 1);
    }
}

impl Default for InMemoryConfigStore {
    fn default() -> Self {
        Self::new(GeocodingSettings::default())
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn settings(&self) -> GeocodingSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }

    fn active_api_key(&self, provider: &str) -> Option<String> {
        self.api_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .cloned()
    }

    fn is_quota_exceeded(&self, provider: &str) -> bool {
        let limits = self
            .settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .quota_limits(provider);
        self.quota.is_exceeded(provider, &limits)
    }

    fn increment_quota(&self, provider: &str) {
        self.quota.record(provider);
    }

    fn quota_usage(&self, provider: &str) -> QuotaUsage {
        self.quota.usage(provider)
    }
}
