//! Interval-based provider probing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{HealthMonitor, ProviderHealth};
use crate::providers::GeocodingProvider;
use crate::telemetry;

/// Default upper bound for a single health probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Weight of the newest sample in the smoothed probe latency.
const LATENCY_WEIGHT: f64 = 0.25;

#[derive(Default)]
struct Record {
    health: Option<ProviderHealth>,
    /// Smoothed latency of the probes since the last failure, in microseconds.
    smoothed_micros: Option<f64>,
}

impl Record {
    fn succeeded(&mut self, elapsed: Duration) -> ProviderHealth {
        let sample = elapsed.as_micros() as f64;
        let smoothed = match self.smoothed_micros {
            Some(prev) => prev + LATENCY_WEIGHT * (sample - prev),
            None => sample,
        };
        self.smoothed_micros = Some(smoothed);
        ProviderHealth::healthy(Some(Duration::from_micros(smoothed.round() as u64)))
    }

    fn failed(&mut self, error: String) -> ProviderHealth {
        // a recovered provider starts from a fresh latency estimate
        self.smoothed_micros = None;
        let failures = self
            .health
            .as_ref()
            .map_or(0, |h| h.consecutive_failures)
            + 1;
        ProviderHealth::unhealthy(error, failures)
    }

    fn latency(&self) -> Option<Duration> {
        match &self.health {
            Some(h) if h.is_healthy => h.response_time,
            _ => None,
        }
    }
}

struct Probes {
    interval: watch::Sender<Duration>,
    probe_timeout: Duration,
    records: RwLock<HashMap<String, Record>>,
}

impl Probes {
    async fn probe(&self, provider: &dyn GeocodingProvider) -> ProviderHealth {
        let name = provider.name();
        let start = Instant::now();
        let outcome = match tokio::time::timeout(self.probe_timeout, provider.health_check()).await
        {
            Ok(Ok(())) => Ok(start.elapsed()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("health check timed out after {:?}", self.probe_timeout)),
        };

        let status = if outcome.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::HEALTH_CHECKS_TOTAL,
            "provider" => name.to_owned(),
            "status" => status,
        )
        .increment(1);

        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let Some(record) = records.get_mut(name) else {
            // stopped while the probe was running
            return match outcome {
                Ok(elapsed) => ProviderHealth::healthy(Some(elapsed)),
                Err(error) => ProviderHealth::unhealthy(error, 1),
            };
        };

        let health = match outcome {
            Ok(elapsed) => {
                debug!(provider = name, latency_ms = elapsed.as_millis() as u64, "health check ok");
                record.succeeded(elapsed)
            }
            Err(error) => {
                let health = record.failed(error);
                warn!(
                    provider = name,
                    consecutive_failures = health.consecutive_failures,
                    error = health.last_error.as_deref().unwrap_or_default(),
                    "health check failed"
                );
                health
            }
        };
        record.health = Some(health.clone());
        health
    }
}

/// [`HealthMonitor`] that probes each provider's `health_check()` on an
/// interval and recommends the healthy provider with the lowest smoothed
/// latency. A failed probe discards the provider's latency history.
///
/// The interval can be changed while probe loops run; the next probe is then
/// scheduled one new interval after the previous one.
///
/// Probe tasks run on the ambient tokio runtime. Without one,
/// `start_monitoring` only registers the provider and probes happen through
/// [`check_now`](Self::check_now).
pub struct ConnectivityMonitor {
    probes: Arc<Probes>,
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(interval: Duration) -> Self {
        Self::with_probe_timeout(interval, DEFAULT_PROBE_TIMEOUT)
    }

    pub fn with_probe_timeout(interval: Duration, probe_timeout: Duration) -> Self {
        Self {
            probes: Arc::new(Probes {
                interval: watch::Sender::new(interval),
                probe_timeout,
                records: RwLock::new(HashMap::new()),
            }),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Current probe interval.
    pub fn interval(&self) -> Duration {
        *self.probes.interval.borrow()
    }

    /// Probe a monitored provider immediately and return the new health.
    pub async fn check_now(&self, provider: &dyn GeocodingProvider) -> ProviderHealth {
        self.probes.probe(provider).await
    }

    /// Names currently being monitored.
    pub fn monitored(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .probes
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    fn spawn_probe_loop(&self, provider: Arc<dyn GeocodingProvider>) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(provider = provider.name(), "no runtime, periodic probing disabled");
            return None;
        };
        let probes = Arc::clone(&self.probes);
        let mut interval = probes.interval.subscribe();
        Some(runtime.spawn(async move {
            loop {
                let started = Instant::now();
                probes.probe(provider.as_ref()).await;
                let mut next = started + *interval.borrow_and_update();
                loop {
                    tokio::select! {
                        () = tokio::time::sleep_until(next) => break,
                        changed = interval.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            next = started + *interval.borrow_and_update();
                        }
                    }
                }
            }
        }))
    }
}

impl HealthMonitor for ConnectivityMonitor {
    fn start_monitoring(&self, provider: Arc<dyn GeocodingProvider>) {
        let name = provider.name().to_owned();
        self.stop_monitoring(&name);
        self.probes
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Record::default());
        if let Some(task) = self.spawn_probe_loop(provider) {
            self.tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(name, task);
        }
    }

    fn stop_monitoring(&self, name: &str) {
        if let Some(task) = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
        {
            task.abort();
        }
        self.probes
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        self.probes
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .and_then(|r| r.health.clone())
    }

    fn set_probe_interval(&self, interval: Duration) {
        let previous = self.probes.interval.send_replace(interval);
        if previous != interval {
            debug!(interval_secs = interval.as_secs(), "health probe interval changed");
        }
    }

    fn recommended_provider(&self) -> Option<String> {
        let records = self
            .probes
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        records
            .iter()
            .filter_map(|(name, r)| r.latency().map(|latency| (latency, name)))
            .min()
            .map(|(_, name)| name.clone())
    }
}

impl Drop for ConnectivityMonitor {
    fn drop(&mut self) {
        for (_, task) in self
            .tasks
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
        {
            task.abort();
        }
    }
}
