//! Per-request options

use serde::{Deserialize, Serialize};

use super::{BoundingBox, Coordinates};

/// Options for forward geocoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeocodingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub country_codes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    /// Provider to try first, if eligible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl GeocodingOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn country_code(mut self, code: impl Into<String>) -> Self {
        self.country_codes.push(code.into());
        self
    }

    pub fn bounds(mut self, bounds: BoundingBox) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    /// Set options as `(name, value)` pairs, for cache keys.
    pub(crate) fn key_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(ref language) = self.language {
            pairs.push(("language", language.to_lowercase()));
        }
        if !self.country_codes.is_empty() {
            let mut codes: Vec<_> = self
                .country_codes
                .iter()
                .map(|c| c.to_lowercase())
                .collect();
            codes.sort();
            codes.dedup();
            pairs.push(("countries", codes.join(",")));
        }
        if let Some(b) = self.bounds {
            pairs.push(("bounds", format!("{},{},{},{}", b.south, b.west, b.north, b.east)));
        }
        if let Some(ref provider) = self.provider {
            pairs.push(("provider", provider.clone()));
        }
        pairs
    }
}

/// Options for reverse geocoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocodingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Level of detail (Nominatim zoom, 3 = country .. 18 = building).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ReverseGeocodingOptions {
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn zoom(mut self, zoom: u8) -> Self {
        self.zoom = Some(zoom);
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    pub(crate) fn key_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(ref language) = self.language {
            pairs.push(("language", language.to_lowercase()));
        }
        if let Some(zoom) = self.zoom {
            pairs.push(("zoom", zoom.to_string()));
        }
        if let Some(ref provider) = self.provider {
            pairs.push(("provider", provider.clone()));
        }
        pairs
    }
}

/// Options for autocomplete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub country_codes: Vec<String>,
    /// Bias suggestions toward this position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proximity: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl AutocompleteOptions {
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn proximity(mut self, coords: Coordinates) -> Self {
        self.proximity = Some(coords);
        self
    }

    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.provider = Some(name.into());
        self
    }

    /// Geocoding options used when a provider has no native autocomplete.
    pub(crate) fn as_geocoding(&self) -> GeocodingOptions {
        GeocodingOptions {
            limit: self.limit,
            language: self.language.clone(),
            country_codes: self.country_codes.clone(),
            bounds: None,
            provider: self.provider.clone(),
        }
    }
}
