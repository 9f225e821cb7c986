//! The provider trait implemented by every geocoding backend.
//!
//! Providers declare what they can do up front through
//! [`GeocodingProvider::capabilities`], so the selector decides statically
//! which providers are candidates for an operation instead of probing them
//! at call time.
//!
//! `autocomplete` is a required method. Providers whose capability flags say
//! `autocomplete: false` return [`GeocodingError::Unsupported`] from it; the
//! facade never calls it on them and adapts `geocode` results instead.
//!
//! [`GeocodingError::Unsupported`]: crate::GeocodingError::Unsupported

use async_trait::async_trait;

use crate::Result;
use crate::types::{
    AutocompleteOptions, AutocompleteSuggestion, Coordinates, GeocodingOptions, GeocodingResult,
    ProviderCapabilities, ProviderKind, ReverseGeocodingOptions, ReverseGeocodingResult,
};

/// A geocoding backend (OpenStreetMap, Google, Mapbox, ...).
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    /// Unique provider name, as used in configuration.
    fn name(&self) -> &str;

    /// Backend family.
    fn provider_type(&self) -> ProviderKind;

    /// Operations this provider supports.
    fn capabilities(&self) -> ProviderCapabilities;

    /// Forward geocode a free-form address.
    async fn geocode(
        &self,
        address: &str,
        options: &GeocodingOptions,
    ) -> Result<Vec<GeocodingResult>>;

    /// Resolve a position to an address.
    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
        options: &ReverseGeocodingOptions,
    ) -> Result<ReverseGeocodingResult>;

    /// Type-ahead suggestions for a partial query.
    async fn autocomplete(
        &self,
        query: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<AutocompleteSuggestion>>;

    /// Cheap reachability probe used by the health monitor.
    ///
    /// Default: assume reachable. Override where the backend has a status
    /// endpoint that does not consume quota.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
