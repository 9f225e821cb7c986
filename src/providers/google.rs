//! Google Maps Platform client (Geocoding API + Places Autocomplete).
//!
//! See: <https://developers.google.com/maps/documentation/geocoding>
//!
//! Google reports most failures with HTTP 200 and a `status` field in the
//! body; [`check_body_status`] maps those onto [`GeocodingError`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::http::{build_client, check_status};
use super::traits::GeocodingProvider;
use crate::config::ProviderSettings;
use crate::types::{
    AddressComponents, AutocompleteOptions, AutocompleteSuggestion, BoundingBox, Coordinates,
    GeocodingOptions, GeocodingResult, ProviderCapabilities, ProviderKind,
    ReverseGeocodingOptions, ReverseGeocodingResult,
};
use crate::{GeocodingError, Result};

/// Default base URL for the Google Maps web services
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

/// Bias radius (metres) used with `AutocompleteOptions::proximity`.
const PROXIMITY_RADIUS_M: u32 = 50_000;

/// Client for the Google Geocoding and Places APIs.
#[derive(Clone)]
pub struct GoogleClient {
    name: String,
    api_key: String,
    http: Client,
    base_url: String,
    language: Option<String>,
    capabilities: ProviderCapabilities,
}

impl GoogleClient {
    pub fn new(name: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(name, api_key, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            api_key: api_key.into(),
            http: build_client(Duration::from_secs(30), None)?,
            base_url: base_url.into(),
            language: None,
            capabilities: ProviderCapabilities::full(),
        })
    }

    /// Build from configuration. Google requires an API key.
    pub fn from_settings(
        settings: &ProviderSettings,
        api_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = api_key.ok_or_else(|| {
            GeocodingError::Configuration(format!("provider '{}' needs an API key", settings.name))
        })?;
        Ok(Self {
            name: settings.name.clone(),
            api_key: api_key.to_string(),
            http: build_client(timeout, settings.user_agent.as_deref())?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            language: settings.language.clone(),
            capabilities: settings.effective_capabilities(),
        })
    }

    async fn fetch_geocode(&self, params: Vec<(&str, String)>) -> Result<Vec<GoogleResult>> {
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;
        check_status(&response, &self.name)?;

        let body: GeocodeResponse = response.json().await?;
        check_body_status(&body.status, body.error_message.as_deref())?;
        Ok(body.results)
    }

    fn language<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.language.as_deref())
    }
}

/// Map Google's body-level `status` onto an error. `ZERO_RESULTS` is success.
fn check_body_status(status: &str, message: Option<&str>) -> Result<()> {
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => {
            Err(GeocodingError::RateLimited { retry_after: None })
        }
        "REQUEST_DENIED" => Err(GeocodingError::AuthenticationFailed),
        "INVALID_REQUEST" => Err(GeocodingError::Api {
            status: 400,
            message: message.unwrap_or("invalid request").to_string(),
        }),
        other => Err(GeocodingError::Api {
            status: 502,
            message: format!("google status {other}: {}", message.unwrap_or_default()),
        }),
    }
}

#[derive(Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Deserialize)]
struct GoogleResult {
    formatted_address: String,
    geometry: Geometry,
    #[serde(default)]
    address_components: Vec<AddressComponent>,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Deserialize)]
struct Geometry {
    location: LatLng,
    #[serde(default)]
    viewport: Option<Viewport>,
    #[serde(default)]
    location_type: Option<String>,
}

#[derive(Deserialize, Clone, Copy)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Deserialize)]
struct Viewport {
    northeast: LatLng,
    southwest: LatLng,
}

#[derive(Deserialize)]
struct AddressComponent {
    long_name: String,
    short_name: String,
    types: Vec<String>,
}

fn address_from_components(components: &[AddressComponent]) -> AddressComponents {
    let find = |kind: &str| components.iter().find(|c| c.types.iter().any(|t| t == kind));
    AddressComponents {
        house_number: find("street_number").map(|c| c.long_name.clone()),
        road: find("route").map(|c| c.long_name.clone()),
        city: find("locality")
            .or_else(|| find("postal_town"))
            .map(|c| c.long_name.clone()),
        state: find("administrative_area_level_1").map(|c| c.long_name.clone()),
        postcode: find("postal_code").map(|c| c.long_name.clone()),
        country: find("country").map(|c| c.long_name.clone()),
        country_code: find("country").map(|c| c.short_name.clone()),
    }
}

/// Google has no relevance score; location precision is the closest proxy.
fn confidence_for(location_type: Option<&str>) -> Option<f64> {
    match location_type? {
        "ROOFTOP" => Some(1.0),
        "RANGE_INTERPOLATED" => Some(0.8),
        "GEOMETRIC_CENTER" => Some(0.6),
        "APPROXIMATE" => Some(0.4),
        _ => None,
    }
}

impl GoogleResult {
    fn into_result(self, provider: &str) -> GeocodingResult {
        let loc = self.geometry.location;
        GeocodingResult {
            coordinates: Coordinates::new(loc.lat, loc.lng),
            address: address_from_components(&self.address_components),
            display_name: self.formatted_address,
            place_type: self.types.into_iter().next(),
            bounding_box: self.geometry.viewport.map(|v| {
                BoundingBox::new(
                    v.southwest.lat,
                    v.southwest.lng,
                    v.northeast.lat,
                    v.northeast.lng,
                )
            }),
            confidence: confidence_for(self.geometry.location_type.as_deref()),
            provider: provider.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct AutocompleteResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
struct Prediction {
    description: String,
    place_id: String,
    #[serde(default)]
    types: Vec<String>,
}

#[async_trait]
impl GeocodingProvider for GoogleClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn geocode(
        &self,
        address: &str,
        options: &GeocodingOptions,
    ) -> Result<Vec<GeocodingResult>> {
        let mut params: Vec<(&str, String)> = vec![("address", address.to_string())];
        if let Some(lang) = self.language(options.language.as_deref()) {
            params.push(("language", lang.to_string()));
        }
        if !options.country_codes.is_empty() {
            let components = options
                .country_codes
                .iter()
                .map(|c| format!("country:{}", c.to_uppercase()))
                .collect::<Vec<_>>()
                .join("|");
            params.push(("components", components));
        }
        if let Some(b) = options.bounds {
            params.push((
                "bounds",
                format!("{},{}|{},{}", b.south, b.west, b.north, b.east),
            ));
        }

        let results = self.fetch_geocode(params).await?;
        let mut results: Vec<_> = results
            .into_iter()
            .map(|r| r.into_result(&self.name))
            .collect();
        if let Some(limit) = options.limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
        options: &ReverseGeocodingOptions,
    ) -> Result<ReverseGeocodingResult> {
        let mut params: Vec<(&str, String)> = vec![(
            "latlng",
            format!("{},{}", coordinates.latitude, coordinates.longitude),
        )];
        if let Some(lang) = self.language(options.language.as_deref()) {
            params.push(("language", lang.to_string()));
        }

        let first = self
            .fetch_geocode(params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GeocodingError::NotFound(format!(
                    "{}: nothing at {},{}",
                    self.name, coordinates.latitude, coordinates.longitude
                ))
            })?;
        let result = first.into_result(&self.name);
        Ok(ReverseGeocodingResult {
            coordinates: result.coordinates,
            display_name: result.display_name,
            address: result.address,
            provider: result.provider,
        })
    }

    async fn autocomplete(
        &self,
        query: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<AutocompleteSuggestion>> {
        let url = format!("{}/maps/api/place/autocomplete/json", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("input", query.to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(lang) = self.language(options.language.as_deref()) {
            params.push(("language", lang.to_string()));
        }
        if let Some(p) = options.proximity {
            params.push(("location", format!("{},{}", p.latitude, p.longitude)));
            params.push(("radius", PROXIMITY_RADIUS_M.to_string()));
        }
        if !options.country_codes.is_empty() {
            let components = options
                .country_codes
                .iter()
                .map(|c| format!("country:{}", c.to_lowercase()))
                .collect::<Vec<_>>()
                .join("|");
            params.push(("components", components));
        }

        let response = self.http.get(&url).query(&params).send().await?;
        check_status(&response, &self.name)?;

        let body: AutocompleteResponse = response.json().await?;
        check_body_status(&body.status, body.error_message.as_deref())?;

        let mut suggestions: Vec<_> = body
            .predictions
            .into_iter()
            .map(|p| AutocompleteSuggestion {
                display_name: p.description,
                coordinates: None,
                place_id: Some(p.place_id),
                place_type: p.types.into_iter().next(),
                provider: self.name.clone(),
            })
            .collect();
        if let Some(limit) = options.limit {
            suggestions.truncate(limit);
        }
        Ok(suggestions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_status_mapping() {
        assert!(check_body_status("OK", None).is_ok());
        assert!(check_body_status("ZERO_RESULTS", None).is_ok());
        assert!(matches!(
            check_body_status("OVER_QUERY_LIMIT", None),
            Err(GeocodingError::RateLimited { .. })
        ));
        assert!(matches!(
            check_body_status("REQUEST_DENIED", Some("bad key")),
            Err(GeocodingError::AuthenticationFailed)
        ));
        assert!(matches!(
            check_body_status("INVALID_REQUEST", None),
            Err(GeocodingError::Api { status: 400, .. })
        ));
        assert!(matches!(
            check_body_status("UNKNOWN_ERROR", None),
            Err(GeocodingError::Api { status: 502, .. })
        ));
    }

    #[test]
    fn address_components_are_mapped() {
        let components: Vec<AddressComponent> = serde_json::from_value(serde_json::json!([
            { "long_name": "1600", "short_name": "1600", "types": ["street_number"] },
            { "long_name": "Amphitheatre Parkway", "short_name": "Amphitheatre Pkwy", "types": ["route"] },
            { "long_name": "Mountain View", "short_name": "Mountain View", "types": ["locality", "political"] },
            { "long_name": "United States", "short_name": "US", "types": ["country", "political"] }
        ]))
        .unwrap();
        let address = address_from_components(&components);
        assert_eq!(address.house_number.as_deref(), Some("1600"));
        assert_eq!(address.road.as_deref(), Some("Amphitheatre Parkway"));
        assert_eq!(address.city.as_deref(), Some("Mountain View"));
        assert_eq!(address.country_code.as_deref(), Some("US"));
        assert!(address.postcode.is_none());
    }

    #[test]
    fn location_type_confidence() {
        assert_eq!(confidence_for(Some("ROOFTOP")), Some(1.0));
        assert_eq!(confidence_for(None), None);
    }
}
