//! Geocoding backends and provider selection.
//!
//! Each backend implements [`GeocodingProvider`]. The facade never constructs
//! clients directly: it asks a [`ProviderFactory`] for one whenever a
//! provider's configuration signature changes, which keeps test doubles and
//! custom backends pluggable at a single seam.

mod http;
pub mod google;
pub mod mapbox;
pub mod nominatim;
pub mod selector;
mod timeout;
pub mod traits;

pub use google::GoogleClient;
pub use mapbox::MapboxClient;
pub use nominatim::NominatimClient;
pub use selector::{Assessment, ProviderHandle, ProviderSelector};
pub use traits::GeocodingProvider;

pub(crate) use timeout::with_timeout;

use std::sync::Arc;
use std::time::Duration;

use crate::Result;
use crate::config::ProviderSettings;
use crate::types::ProviderKind;

/// Builds provider clients from configuration.
pub trait ProviderFactory: Send + Sync {
    /// Create a client for `settings`. `api_key` is the key currently active
    /// in the config store; `timeout` is the per-request timeout.
    fn create(
        &self,
        settings: &ProviderSettings,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Arc<dyn GeocodingProvider>>;
}

/// Factory for the built-in HTTP clients, dispatching on [`ProviderKind`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(
        &self,
        settings: &ProviderSettings,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Arc<dyn GeocodingProvider>> {
        let provider: Arc<dyn GeocodingProvider> = match settings.kind {
            ProviderKind::OpenStreetMap => {
                Arc::new(NominatimClient::from_settings(settings, timeout)?)
            }
            ProviderKind::Google => {
                Arc::new(GoogleClient::from_settings(settings, api_key, timeout)?)
            }
            ProviderKind::Mapbox => {
                Arc::new(MapboxClient::from_settings(settings, api_key, timeout)?)
            }
        };
        Ok(provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeocodingError;

    #[test]
    fn default_factory_builds_by_kind() {
        let factory = DefaultProviderFactory;
        let timeout = Duration::from_secs(5);

        let osm = factory
            .create(
                &ProviderSettings::new("osm", ProviderKind::OpenStreetMap),
                None,
                timeout,
            )
            .unwrap();
        assert_eq!(osm.name(), "osm");
        assert_eq!(osm.provider_type(), ProviderKind::OpenStreetMap);

        let mapbox = factory
            .create(
                &ProviderSettings::new("mapbox", ProviderKind::Mapbox),
                Some("pk.test"),
                timeout,
            )
            .unwrap();
        assert_eq!(mapbox.provider_type(), ProviderKind::Mapbox);
    }

    #[test]
    fn keyed_providers_require_api_key() {
        let err = DefaultProviderFactory
            .create(
                &ProviderSettings::new("google", ProviderKind::Google),
                None,
                Duration::from_secs(5),
            )
            .err()
            .unwrap();
        assert!(matches!(err, GeocodingError::Configuration(_)));
    }
}
