//! Geofacade error types

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Stable codes for availability failures raised by the facade itself.
///
/// These are distinguishable from generic provider/network errors and are
/// safe to match on from UI code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoProvider,
    OfflineRestricted,
    QuotaExceeded,
    PolicyRestricted,
}

impl ErrorCode {
    /// Wire form, e.g. `"NO_PROVIDER"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoProvider => "NO_PROVIDER",
            ErrorCode::OfflineRestricted => "OFFLINE_RESTRICTED",
            ErrorCode::QuotaExceeded => "QUOTA_EXCEEDED",
            ErrorCode::PolicyRestricted => "POLICY_RESTRICTED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Geofacade error types.
///
/// `Clone` so a deduplicated failure can be handed to every waiting caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GeocodingError {
    // Local validation errors
    #[error("invalid coordinates: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Availability errors
    #[error("no geocoding provider available")]
    NoProvider,

    #[error("all eligible providers have exceeded their quota")]
    QuotaExceeded,

    #[error("operation restricted by provider policy")]
    PolicyRestricted,

    #[error("offline mode is enabled and the network is unreachable")]
    OfflineRestricted,

    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("provider '{provider}' timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("provider does not support this operation")]
    Unsupported,

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("no result found: {0}")]
    NotFound(String),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GeocodingError {
    /// Stable availability code, if this is an availability failure.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            GeocodingError::NoProvider => Some(ErrorCode::NoProvider),
            GeocodingError::QuotaExceeded => Some(ErrorCode::QuotaExceeded),
            GeocodingError::PolicyRestricted => Some(ErrorCode::PolicyRestricted),
            GeocodingError::OfflineRestricted => Some(ErrorCode::OfflineRestricted),
            _ => None,
        }
    }

    /// Raised by the facade when nothing eligible exists under current
    /// policy, quota or connectivity state.
    pub fn is_availability(&self) -> bool {
        self.code().is_some()
    }

    /// Rejected locally before any provider was contacted.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            GeocodingError::InvalidCoordinates { .. } | GeocodingError::InvalidInput(_)
        )
    }

    /// Failure of a single provider attempt. These advance the fallback chain.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            GeocodingError::Http(_)
                | GeocodingError::Api { .. }
                | GeocodingError::RateLimited { .. }
                | GeocodingError::AuthenticationFailed
                | GeocodingError::Timeout { .. }
                | GeocodingError::Unsupported
                | GeocodingError::Decode(_)
                | GeocodingError::NotFound(_)
        )
    }
}

impl From<ErrorCode> for GeocodingError {
    fn from(code: ErrorCode) -> Self {
        match code {
            ErrorCode::NoProvider => GeocodingError::NoProvider,
            ErrorCode::OfflineRestricted => GeocodingError::OfflineRestricted,
            ErrorCode::QuotaExceeded => GeocodingError::QuotaExceeded,
            ErrorCode::PolicyRestricted => GeocodingError::PolicyRestricted,
        }
    }
}

impl From<reqwest::Error> for GeocodingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GeocodingError::Decode(err.to_string())
        } else {
            GeocodingError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GeocodingError {
    fn from(err: serde_json::Error) -> Self {
        GeocodingError::Decode(err.to_string())
    }
}

/// Result type alias for geofacade operations
pub type Result<T> = std::result::Result<T, GeocodingError>;
