//! Mapbox Geocoding API (v5) client.
//!
//! See: <https://docs.mapbox.com/api/search/geocoding-v5/>

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
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

/// Default base URL for the Mapbox API
pub const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

/// Client for the Mapbox `mapbox.places` endpoint.
#[derive(Clone)]
pub struct MapboxClient {
    name: String,
    access_token: String,
    http: Client,
    base_url: String,
    language: Option<String>,
    capabilities: ProviderCapabilities,
}

impl MapboxClient {
    pub fn new(name: impl Into<String>, access_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(name, access_token, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        name: impl Into<String>,
        access_token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            access_token: access_token.into(),
            http: build_client(Duration::from_secs(30), None)?,
            base_url: base_url.into(),
            language: None,
            capabilities: ProviderCapabilities::full(),
        })
    }

    /// Build from configuration. Mapbox requires an access token.
    pub fn from_settings(
        settings: &ProviderSettings,
        access_token: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let access_token = access_token.ok_or_else(|| {
            GeocodingError::Configuration(format!(
                "provider '{}' needs an access token",
                settings.name
            ))
        })?;
        Ok(Self {
            name: settings.name.clone(),
            access_token: access_token.to_string(),
            http: build_client(timeout, settings.user_agent.as_deref())?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            language: settings.language.clone(),
            capabilities: settings.effective_capabilities(),
        })
    }

    /// `{base}/geocoding/v5/mapbox.places/{search}.json`, with `search`
    /// percent-encoded as a single path segment.
    fn places_url(&self, search: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| GeocodingError::Configuration(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GeocodingError::Configuration("base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places"])
            .push(&format!("{search}.json"));
        Ok(url)
    }

    async fn fetch(&self, url: Url, params: Vec<(&str, String)>) -> Result<Vec<Feature>> {
        let response = self
            .http
            .get(url)
            .query(&params)
            .query(&[("access_token", self.access_token.as_str())])
            .send()
            .await?;
        check_status(&response, &self.name)?;

        let body: FeatureCollection = response.json().await?;
        Ok(body.features)
    }

    fn search_params(
        &self,
        limit: Option<usize>,
        language: Option<&str>,
        country_codes: &[String],
        autocomplete: bool,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![("autocomplete", autocomplete.to_string())];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(lang) = language.or(self.language.as_deref()) {
            params.push(("language", lang.to_string()));
        }
        if !country_codes.is_empty() {
            params.push(("country", country_codes.join(",").to_lowercase()));
        }
        params
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    id: String,
    place_name: String,
    /// `[longitude, latitude]`
    center: [f64; 2],
    #[serde(default)]
    place_type: Vec<String>,
    #[serde(default)]
    relevance: Option<f64>,
    /// `[west, south, east, north]`
    #[serde(default)]
    bbox: Option<[f64; 4]>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    context: Vec<ContextItem>,
}

#[derive(Deserialize)]
struct ContextItem {
    id: String,
    text: String,
    #[serde(default)]
    short_code: Option<String>,
}

impl Feature {
    fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.center[1], self.center[0])
    }

    fn address(&self) -> AddressComponents {
        let ctx = |prefix: &str| {
            self.context
                .iter()
                .find(|c| c.id.split('.').next() == Some(prefix))
        };
        let is_address = self.place_type.iter().any(|t| t == "address");
        AddressComponents {
            house_number: self.address.clone(),
            road: if is_address { self.text.clone() } else { None },
            city: ctx("place").map(|c| c.text.clone()),
            state: ctx("region").map(|c| c.text.clone()),
            postcode: ctx("postcode").map(|c| c.text.clone()),
            country: ctx("country").map(|c| c.text.clone()),
            country_code: ctx("country")
                .and_then(|c| c.short_code.as_ref())
                .map(|c| c.to_uppercase()),
        }
    }

    fn into_result(self, provider: &str) -> GeocodingResult {
        GeocodingResult {
            coordinates: self.coordinates(),
            address: self.address(),
            bounding_box: self.bbox.map(|b| BoundingBox::new(b[1], b[0], b[3], b[2])),
            place_type: self.place_type.into_iter().next(),
            confidence: self.relevance,
            display_name: self.place_name,
            provider: provider.to_string(),
        }
    }
}

#[async_trait]
impl GeocodingProvider for MapboxClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderKind {
        ProviderKind::Mapbox
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    async fn geocode(
        &self,
        address: &str,
        options: &GeocodingOptions,
    ) -> Result<Vec<GeocodingResult>> {
        let url = self.places_url(address)?;
        let mut params = self.search_params(
            options.limit,
            options.language.as_deref(),
            &options.country_codes,
            false,
        );
        if let Some(b) = options.bounds {
            params.push(("bbox", format!("{},{},{},{}", b.west, b.south, b.east, b.north)));
        }

        let features = self.fetch(url, params).await?;
        Ok(features
            .into_iter()
            .map(|f| f.into_result(&self.name))
            .collect())
    }

    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
        options: &ReverseGeocodingOptions,
    ) -> Result<ReverseGeocodingResult> {
        let url = self.places_url(&format!(
            "{},{}",
            coordinates.longitude, coordinates.latitude
        ))?;
        let mut params = vec![("limit", "1".to_string())];
        if let Some(lang) = options.language.as_deref().or(self.language.as_deref()) {
            params.push(("language", lang.to_string()));
        }

        let feature = self
            .fetch(url, params)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GeocodingError::NotFound(format!(
                    "{}: nothing at {},{}",
                    self.name, coordinates.latitude, coordinates.longitude
                ))
            })?;
        let result = feature.into_result(&self.name);
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
        let url = self.places_url(query)?;
        let mut params = self.search_params(
            options.limit,
            options.language.as_deref(),
            &options.country_codes,
            true,
        );
        if let Some(p) = options.proximity {
            params.push(("proximity", format!("{},{}", p.longitude, p.latitude)));
        }

        let features = self.fetch(url, params).await?;
        Ok(features
            .into_iter()
            .map(|f| {
                let place_id = f.id.clone();
                let mut suggestion = AutocompleteSuggestion::from(f.into_result(&self.name));
                suggestion.place_id = Some(place_id);
                suggestion
            })
            .collect())
    }
}
