//! Builder for configuring facade instances

use std::sync::Arc;

use super::GeocodingService;
use crate::config::{ConfigStore, GeocodingSettings, InMemoryConfigStore};
use crate::health::{ConnectivityMonitor, HealthMonitor, NetworkState, NetworkStatus};
use crate::providers::{DefaultProviderFactory, ProviderFactory};
use crate::{GeocodingError, Result};

/// Builder for [`GeocodingService`].
///
/// Every collaborator has a default:
///
/// - config store: [`InMemoryConfigStore`] holding [`settings`](Self::settings),
///   or [`GeocodingSettings::default`]
/// - health monitor: [`ConnectivityMonitor`] probing at the configured interval
/// - network status: [`NetworkState`], online
/// - provider factory: [`DefaultProviderFactory`] (Nominatim, Google, Mapbox)
///
/// ```rust,no_run
/// use geofacade::{GeocodingOptions, GeocodingService, GeocodingSettings};
///
/// #[tokio::main]
/// async fn main() -> geofacade::Result<()> {
///     let service = GeocodingService::builder()
///         .settings(GeocodingSettings::load_or_default(None)?)
///         .build()?;
///     let _pruner = service.spawn_cache_pruner();
///
///     let results = service.geocode("Paris", &GeocodingOptions::default()).await?;
///     println!("{}", results[0].display_name);
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct GeocodingServiceBuilder {
    settings: Option<GeocodingSettings>,
    api_keys: Vec<(String, String)>,
    config: Option<Arc<dyn ConfigStore>>,
    health: Option<Arc<dyn HealthMonitor>>,
    network: Option<Arc<dyn NetworkStatus>>,
    factory: Option<Arc<dyn ProviderFactory>>,
}

impl GeocodingServiceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use these settings in an in-memory config store.
    pub fn settings(mut self, settings: GeocodingSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Add an API key to the in-memory config store.
    pub fn api_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.api_keys.push((provider.into(), key.into()));
        self
    }

    /// Use an external config store. Excludes [`settings`](Self::settings)
    /// and [`api_key`](Self::api_key).
    pub fn config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config = Some(store);
        self
    }

    pub fn health_monitor(mut self, monitor: Arc<dyn HealthMonitor>) -> Self {
        self.health = Some(monitor);
        self
    }

    pub fn network_status(mut self, status: Arc<dyn NetworkStatus>) -> Self {
        self.network = Some(status);
        self
    }

    pub fn provider_factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Build the service and load the initial configuration.
    ///
    /// Fails if both an external store and inline settings were given, or if
    /// the settings do not validate. Providers whose client cannot be built
    /// (for example a missing API key) are left inactive, not fatal.
    pub fn build(self) -> Result<GeocodingService> {
        let config: Arc<dyn ConfigStore> = match self.config {
            Some(_) if self.settings.is_some() || !self.api_keys.is_empty() => {
                return Err(GeocodingError::Configuration(
                    "use either config_store() or settings()/api_key(), not both".to_string(),
                ));
            }
            Some(store) => store,
            None => {
                let store = self
                    .api_keys
                    .into_iter()
                    .fold(
                        InMemoryConfigStore::new(self.settings.unwrap_or_default()),
                        |store, (provider, key)| store.with_api_key(provider, key),
                    );
                Arc::new(store)
            }
        };

        let health = match self.health {
            Some(health) => health,
            None => Arc::new(ConnectivityMonitor::new(
                config.settings().search.health_check_interval(),
            )),
        };

        GeocodingService::assemble(
            config,
            health,
            self.network
                .unwrap_or_else(|| Arc::new(NetworkState::default())),
            self.factory
                .unwrap_or_else(|| Arc::new(DefaultProviderFactory)),
        )
    }
}
