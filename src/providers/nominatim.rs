//! OpenStreetMap Nominatim client.
//!
//! See: <https://nominatim.org/release-docs/latest/api/Overview/>
//!
//! The public instance's usage policy forbids client-side autocomplete, which
//! is why [`PolicyMode::Strict`](crate::config::PolicyMode::Strict) takes this
//! provider out of the autocomplete candidates. Self-hosted instances have no
//! such restriction, so the client itself still serves type-ahead through
//! `/search` with a small limit.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::http::{build_client, check_status, parse_degrees};
use super::traits::GeocodingProvider;
use crate::config::ProviderSettings;
use crate::types::{
    AddressComponents, AutocompleteOptions, AutocompleteSuggestion, BoundingBox, Coordinates,
    GeocodingOptions, GeocodingResult, ProviderCapabilities, ProviderKind,
    ReverseGeocodingOptions, ReverseGeocodingResult,
};
use crate::{GeocodingError, Result};

/// Default base URL for the public Nominatim instance
pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Suggestions returned when the caller gives no limit.
const DEFAULT_AUTOCOMPLETE_LIMIT: usize = 5;

/// Client for a Nominatim instance.
#[derive(Clone)]
pub struct NominatimClient {
    name: String,
    http: Client,
    base_url: String,
    language: Option<String>,
    capabilities: ProviderCapabilities,
}

impl NominatimClient {
    /// Client for the public instance.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_base_url(name, DEFAULT_BASE_URL)
    }

    /// Client for a custom instance (or a wiremock server in tests).
    pub fn with_base_url(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        Ok(Self {
            name: name.into(),
            http: build_client(Duration::from_secs(30), None)?,
            base_url: base_url.into(),
            language: None,
            capabilities: ProviderCapabilities::full(),
        })
    }

    /// Build from configuration.
    pub fn from_settings(settings: &ProviderSettings, timeout: Duration) -> Result<Self> {
        Ok(Self {
            name: settings.name.clone(),
            http: build_client(timeout, settings.user_agent.as_deref())?,
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            language: settings.language.clone(),
            capabilities: settings.effective_capabilities(),
        })
    }

    async fn search(
        &self,
        query: &str,
        limit: Option<usize>,
        language: Option<&str>,
        country_codes: &[String],
        bounds: Option<BoundingBox>,
    ) -> Result<Vec<GeocodingResult>> {
        let url = format!("{}/search", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("q", query.to_string()),
            ("format", "jsonv2".into()),
            ("addressdetails", "1".into()),
        ];
        if let Some(limit) = limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(lang) = language.or(self.language.as_deref()) {
            params.push(("accept-language", lang.to_string()));
        }
        if !country_codes.is_empty() {
            params.push(("countrycodes", country_codes.join(",").to_lowercase()));
        }
        if let Some(b) = bounds {
            params.push((
                "viewbox",
                format!("{},{},{},{}", b.west, b.north, b.east, b.south),
            ));
            params.push(("bounded", "1".into()));
        }

        let response = self.http.get(&url).query(&params).send().await?;
        check_status(&response, &self.name)?;

        let places: Vec<NominatimPlace> = response.json().await?;
        places
            .into_iter()
            .map(|p| p.into_result(&self.name))
            .collect()
    }
}

#[derive(Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
    #[serde(default, rename = "type")]
    place_type: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    /// `[south, north, west, east]`, as strings.
    #[serde(default)]
    boundingbox: Option<Vec<String>>,
    #[serde(default)]
    address: Option<NominatimAddress>,
}

#[derive(Deserialize, Default)]
struct NominatimAddress {
    house_number: Option<String>,
    road: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
    country: Option<String>,
    country_code: Option<String>,
}

impl From<NominatimAddress> for AddressComponents {
    fn from(a: NominatimAddress) -> Self {
        Self {
            house_number: a.house_number,
            road: a.road,
            city: a.city.or(a.town).or(a.village),
            state: a.state,
            postcode: a.postcode,
            country: a.country,
            country_code: a.country_code.map(|c| c.to_uppercase()),
        }
    }
}

impl NominatimPlace {
    fn coordinates(&self) -> Result<Coordinates> {
        Ok(Coordinates::new(
            parse_degrees(&self.lat, "lat")?,
            parse_degrees(&self.lon, "lon")?,
        ))
    }

    fn bounding_box(&self) -> Option<BoundingBox> {
        let b = self.boundingbox.as_ref()?;
        let v: Vec<f64> = b.iter().filter_map(|s| s.parse().ok()).collect();
        (v.len() == 4).then(|| BoundingBox::new(v[0], v[2], v[1], v[3]))
    }

    fn into_result(self, provider: &str) -> Result<GeocodingResult> {
        let coordinates = self.coordinates()?;
        let bounding_box = self.bounding_box();
        Ok(GeocodingResult {
            coordinates,
            display_name: self.display_name,
            address: self.address.map(Into::into).unwrap_or_default(),
            place_type: self.place_type,
            bounding_box,
            confidence: self.importance,
            provider: provider.to_string(),
        })
    }
}

/// `/reverse` answers either a place or `{"error": "..."}` with status 200.
#[derive(Deserialize)]
#[serde(untagged)]
enum ReverseResponse {
    Place(NominatimPlace),
    Error { error: String },
}

#[derive(Deserialize)]
struct StatusResponse {
    status: i32,
    #[serde(default)]
    message: String,
}

#[async_trait]
impl GeocodingProvider for NominatimClient {
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
        self.search(
            address,
            options.limit,
            options.language.as_deref(),
            &options.country_codes,
            options.bounds,
        )
        .await
    }

    async fn reverse_geocode(
        &self,
        coordinates: Coordinates,
        options: &ReverseGeocodingOptions,
    ) -> Result<ReverseGeocodingResult> {
        let url = format!("{}/reverse", self.base_url);

        let mut params: Vec<(&str, String)> = vec![
            ("lat", coordinates.latitude.to_string()),
            ("lon", coordinates.longitude.to_string()),
            ("format", "jsonv2".into()),
            ("addressdetails", "1".into()),
        ];
        if let Some(zoom) = options.zoom {
            params.push(("zoom", zoom.to_string()));
        }
        if let Some(lang) = options.language.as_deref().or(self.language.as_deref()) {
            params.push(("accept-language", lang.to_string()));
        }

        let response = self.http.get(&url).query(&params).send().await?;
        check_status(&response, &self.name)?;

        match response.json::<ReverseResponse>().await? {
            ReverseResponse::Place(place) => {
                let result = place.into_result(&self.name)?;
                Ok(ReverseGeocodingResult {
                    coordinates: result.coordinates,
                    display_name: result.display_name,
                    address: result.address,
                    provider: result.provider,
                })
            }
            ReverseResponse::Error { error } => Err(GeocodingError::NotFound(error)),
        }
    }

    async fn autocomplete(
        &self,
        query: &str,
        options: &AutocompleteOptions,
    ) -> Result<Vec<AutocompleteSuggestion>> {
        let results = self
            .search(
                query,
                Some(options.limit.unwrap_or(DEFAULT_AUTOCOMPLETE_LIMIT)),
                options.language.as_deref(),
                &options.country_codes,
                None,
            )
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/status", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("format", "json")])
            .send()
            .await?;
        check_status(&response, &self.name)?;

        let status: StatusResponse = response.json().await?;
        if status.status == 0 {
            Ok(())
        } else {
            Err(GeocodingError::Api {
                status: 503,
                message: format!("nominatim status {}: {}", status.status, status.message),
            })
        }
    }
}
