//! Public types for the geofacade API.

mod capabilities;
mod coordinates;
mod options;
mod place;

pub use capabilities::{
    Capability, ProviderCapabilities, ProviderKind, SearchCapabilities, SearchMode,
};
pub use coordinates::{BoundingBox, Coordinates};
pub use options::{AutocompleteOptions, GeocodingOptions, ReverseGeocodingOptions};
pub use place::{AddressComponents, AutocompleteSuggestion, GeocodingResult, ReverseGeocodingResult};
