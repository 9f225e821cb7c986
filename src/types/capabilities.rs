//! Provider capability and search-mode types

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// A function a provider may or may not support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Geocoding,
    ReverseGeocoding,
    Autocomplete,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Geocoding => "geocoding",
            Capability::ReverseGeocoding => "reverseGeocoding",
            Capability::Autocomplete => "autocomplete",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability flags declared by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderCapabilities {
    pub geocoding: bool,
    pub reverse_geocoding: bool,
    /// Native type-ahead support. Providers without it are adapted via geocode.
    pub autocomplete: bool,
}

impl ProviderCapabilities {
    /// Geocoding, reverse geocoding and autocomplete.
    pub fn full() -> Self {
        Self {
            geocoding: true,
            reverse_geocoding: true,
            autocomplete: true,
        }
    }

    /// Forward and reverse geocoding, no native autocomplete.
    pub fn geocoding_only() -> Self {
        Self {
            autocomplete: false,
            ..Self::full()
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        match capability {
            Capability::Geocoding => self.geocoding,
            Capability::ReverseGeocoding => self.reverse_geocoding,
            Capability::Autocomplete => self.autocomplete,
        }
    }
}

impl Default for ProviderCapabilities {
    fn default() -> Self {
        Self::full()
    }
}

/// Backend family of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[serde(alias = "osm", alias = "nominatim")]
    OpenStreetMap,
    Google,
    Mapbox,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenStreetMap => "openstreetmap",
            ProviderKind::Google => "google",
            ProviderKind::Mapbox => "mapbox",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a search box should behave under current configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchMode {
    /// Type-ahead suggestions from an online provider.
    OnlineAutocomplete,
    /// No suggestions; search on submit via geocoding.
    SubmitSearch,
    /// Offline-restricted; only cached results can be served.
    OfflineCache,
    /// Nothing usable.
    Disabled,
}

/// Result of [`GeocodingService::search_capabilities`](crate::GeocodingService::search_capabilities).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchCapabilities {
    pub mode: SearchMode,
    /// Why the mode is degraded. `None` for `OnlineAutocomplete`.
    pub reason: Option<ErrorCode>,
    /// Providers the mode would use, in attempt order.
    pub providers: Vec<String>,
}

impl SearchCapabilities {
    pub fn autocomplete_available(&self) -> bool {
        self.mode == SearchMode::OnlineAutocomplete
    }
}
