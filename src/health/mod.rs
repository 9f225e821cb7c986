//! Provider health and network reachability.
//!
//! The facade only reads from this module: it asks a [`HealthMonitor`]
//! whether a provider is healthy and which one is recommended, and asks a
//! [`NetworkStatus`] whether the network is reachable at all. Both are
//! traits so an embedding application can feed in its own signals.

mod monitor;

pub use monitor::ConnectivityMonitor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::GeocodingProvider;

/// Last known health of one provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub is_healthy: bool,
    pub last_check: DateTime<Utc>,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Smoothed probe latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<Duration>,
}

impl ProviderHealth {
    pub fn healthy(response_time: Option<Duration>) -> Self {
        Self {
            is_healthy: true,
            last_check: Utc::now(),
            consecutive_failures: 0,
            last_error: None,
            response_time,
        }
    }

    pub fn unhealthy(error: impl Into<String>, consecutive_failures: u32) -> Self {
        Self {
            is_healthy: false,
            last_check: Utc::now(),
            consecutive_failures,
            last_error: Some(error.into()),
            response_time: None,
        }
    }
}

/// Source of per-provider health.
pub trait HealthMonitor: Send + Sync {
    /// Begin tracking `provider`. Replaces any existing monitoring under the
    /// same name.
    fn start_monitoring(&self, provider: Arc<dyn GeocodingProvider>);

    /// Stop tracking `name` and forget its record.
    fn stop_monitoring(&self, name: &str);

    /// `None` until the first probe completes.
    fn provider_health(&self, name: &str) -> Option<ProviderHealth>;

    /// Healthy provider the monitor would pick first, if it has an opinion.
    fn recommended_provider(&self) -> Option<String>;

    /// Change how often providers are probed. Monitors without a schedule
    /// ignore it.
    fn set_probe_interval(&self, _interval: Duration) {}

    /// Healthy, or not yet probed.
    fn is_healthy(&self, name: &str) -> bool {
        self.provider_health(name).is_none_or(|h| h.is_healthy)
    }
}

/// Whether the network is reachable.
pub trait NetworkStatus: Send + Sync {
    fn is_online(&self) -> bool;
}

/// [`NetworkStatus`] backed by a flag the application flips.
#[derive(Debug)]
pub struct NetworkState {
    online: AtomicBool,
}

impl NetworkState {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }
}

impl Default for NetworkState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkStatus for NetworkState {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }
}
