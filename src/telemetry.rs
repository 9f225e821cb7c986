//! Telemetry metric name constants.
//!
//! Centralised metric names for geofacade operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `geofacade_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "openstreetmap", "google")
//! - `operation`: facade operation ("geocode", "reverse_geocode", "autocomplete")
//! - `status`: "ok" or "error"

/// Total provider attempts dispatched by the facade.
///
/// Labels: `provider`, `operation`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "geofacade_requests_total";

/// Provider attempt duration in seconds.
///
/// Labels: `provider`, `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "geofacade_request_duration_seconds";

/// Attempts that failed and moved on to the next candidate.
///
/// Labels: `provider` (the one that failed), `operation`.
pub const FALLBACKS_TOTAL: &str = "geofacade_fallbacks_total";

/// Total result cache hits.
///
/// Labels: `operation`.
pub const CACHE_HITS_TOTAL: &str = "geofacade_cache_hits_total";

/// Total result cache misses.
///
/// Labels: `operation`.
pub const CACHE_MISSES_TOTAL: &str = "geofacade_cache_misses_total";

/// Calls that joined an identical in-flight request.
pub const DEDUP_COALESCED_TOTAL: &str = "geofacade_dedup_coalesced_total";

/// Health probes run by the connectivity monitor.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const HEALTH_CHECKS_TOTAL: &str = "geofacade_health_checks_total";
