//! Geofacade - unified geocoding facade
//!
//! This crate puts a single [`GeocodingService`] in front of several
//! geocoding backends (OpenStreetMap/Nominatim, Google, Mapbox) and adds
//! what every caller would otherwise rebuild:
//!
//! - a bounded, per-entry-TTL result cache
//! - deduplication of concurrent identical requests
//! - provider selection by capability, quota, health and preference
//! - per-attempt timeouts with fallback to the next provider
//! - offline and policy restrictions surfaced as stable [`ErrorCode`]s
//!
//! # Example
//!
//! ```rust,no_run
//! use geofacade::{Coordinates, GeocodingOptions, GeocodingService, ReverseGeocodingOptions};
//!
//! #[tokio::main]
//! async fn main() -> geofacade::Result<()> {
//!     let service = GeocodingService::builder().build()?;
//!
//!     let places = service
//!         .geocode("Jodrell Bank Observatory", &GeocodingOptions::default().limit(1))
//!         .await?;
//!     println!("{:?}", places[0].coordinates);
//!
//!     let address = service
//!         .reverse_geocode(Coordinates::new(53.2369, -2.3075), &ReverseGeocodingOptions::default())
//!         .await?;
//!     println!("{}", address.display_name);
//!     Ok(())
//! }
//! ```
//!
//! # Search box integration
//!
//! ```rust,no_run
//! # use geofacade::{AutocompleteOptions, GeocodingService, SearchMode};
//! # async fn example(service: GeocodingService) {
//! match service.search_capabilities(None).mode {
//!     SearchMode::OnlineAutocomplete => {
//!         let suggestions = service.autocomplete("Greenw", &AutocompleteOptions::default()).await;
//!         println!("{} suggestions", suggestions.len());
//!     }
//!     SearchMode::SubmitSearch => println!("search on enter"),
//!     SearchMode::OfflineCache => println!("offline, cached results only"),
//!     SearchMode::Disabled => println!("search unavailable"),
//! }
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod providers;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use error::{ErrorCode, GeocodingError, Result};
pub use gateway::{GeocodingService, GeocodingServiceBuilder, ProviderStatus, TaskGuard};

pub use cache::{CacheStats, DedupStats};
pub use config::{
    CacheSettings, ConfigStore, GeocodingSettings, InMemoryConfigStore, PolicyMode,
    ProviderSettings, QuotaLimits, QuotaUsage, SearchSettings,
};
pub use health::{
    ConnectivityMonitor, HealthMonitor, NetworkState, NetworkStatus, ProviderHealth,
};
pub use providers::{GeocodingProvider, ProviderFactory};

// Re-export all types
pub use types::{
    AddressComponents, AutocompleteOptions, AutocompleteSuggestion, BoundingBox, Capability,
    Coordinates, GeocodingOptions, GeocodingResult, ProviderCapabilities, ProviderKind,
    ReverseGeocodingOptions, ReverseGeocodingResult, SearchCapabilities, SearchMode,
};
