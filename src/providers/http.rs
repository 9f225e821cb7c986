//! HTTP plumbing shared by the provider clients.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::{GeocodingError, Result};

/// User agent sent when the configuration does not set one.
pub const DEFAULT_USER_AGENT: &str = concat!("geofacade/", env!("CARGO_PKG_VERSION"));

/// Build a reqwest client with the request timeout and user agent applied.
pub(crate) fn build_client(timeout: Duration, user_agent: Option<&str>) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .build()
        .map_err(|e| GeocodingError::Configuration(format!("failed to build HTTP client: {e}")))
}

/// Check response status and map to the appropriate error.
pub(crate) fn check_status(response: &Response, provider: &str) -> Result<()> {
    let status = response.status();

    if status.is_success() {
        return Ok(());
    }

    match status.as_u16() {
        401 | 403 => Err(GeocodingError::AuthenticationFailed),
        404 => Err(GeocodingError::NotFound(format!("{provider}: {status}"))),
        429 => {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            Err(GeocodingError::RateLimited { retry_after })
        }
        code => Err(GeocodingError::Api {
            status: code,
            message: format!("{provider} API error: {status}"),
        }),
    }
}

/// Parse a coordinate that some APIs (Nominatim) send as a string.
pub(crate) fn parse_degrees(value: &str, field: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| GeocodingError::Decode(format!("invalid {field}: {value:?}")))
}
