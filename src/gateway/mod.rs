//! The geocoding facade and its composition root.

mod builder;
mod service;
mod status;
mod task;

pub use builder::GeocodingServiceBuilder;
pub use service::GeocodingService;
pub use status::ProviderStatus;
pub use task::TaskGuard;
