//! Geocoding result types

use serde::{Deserialize, Serialize};

use super::{BoundingBox, Coordinates};

/// Structured address components, as far as the provider reports them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressComponents {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub road: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

/// One forward-geocoding match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingResult {
    pub coordinates: Coordinates,
    pub display_name: String,
    #[serde(default)]
    pub address: AddressComponents,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Provider relevance in `[0, 1]`, if reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Name of the provider that produced this result.
    pub provider: String,
}

impl GeocodingResult {
    pub fn new(
        coordinates: Coordinates,
        display_name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            coordinates,
            display_name: display_name.into(),
            address: AddressComponents::default(),
            place_type: None,
            bounding_box: None,
            confidence: None,
            provider: provider.into(),
        }
    }
}

/// Reverse-geocoding answer for a single position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseGeocodingResult {
    pub coordinates: Coordinates,
    pub display_name: String,
    #[serde(default)]
    pub address: AddressComponents,
    pub provider: String,
}

/// A type-ahead suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteSuggestion {
    pub display_name: String,
    /// Some providers (e.g. Google Places) only return coordinates on a
    /// follow-up details call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_type: Option<String>,
    pub provider: String,
}

impl From<GeocodingResult> for AutocompleteSuggestion {
    fn from(result: GeocodingResult) -> Self {
        Self {
            display_name: result.display_name,
            coordinates: Some(result.coordinates),
            place_id: None,
            place_type: result.place_type,
            provider: result.provider,
        }
    }
}
