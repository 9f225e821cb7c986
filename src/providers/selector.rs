//! Candidate selection for a facade operation.
//!
//! Selection is a pure function of the current provider set, quota state and
//! health view:
//!
//! ```text
//! configured providers ──► enabled + capable ──► not excluded by caller
//!                                 │               (policy)
//!                                 ▼
//!                         not quota-exceeded ──► healthy (or unprobed)
//!                                                      │
//!                                                      ▼
//!                  primary = preferred ▸ recommended ▸ first configured
//!                                                      │
//!                       fallback off: [primary]        ▼
//!                       fallback on:  [primary, rest in configured order]
//! ```

use std::fmt;
use std::sync::Arc;

use super::traits::GeocodingProvider;
use crate::config::{ConfigStore, ProviderSettings};
use crate::health::HealthMonitor;
use crate::types::Capability;
use crate::{GeocodingError, Result};

/// A built provider client together with the configuration it was built from.
#[derive(Clone)]
pub struct ProviderHandle {
    pub provider: Arc<dyn GeocodingProvider>,
    pub settings: ProviderSettings,
    /// Hash of everything the client was built from.
    pub signature: u64,
}

impl ProviderHandle {
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.provider.capabilities().supports(capability)
    }
}

impl fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("name", &self.settings.name)
            .field("kind", &self.settings.kind)
            .field("signature", &self.signature)
            .finish()
    }
}

/// Outcome of filtering providers for one capability.
#[derive(Debug, Default)]
pub struct Assessment {
    /// Eligible providers, in configured order.
    pub eligible: Vec<ProviderHandle>,
    /// Capable providers dropped by the caller's exclusion predicate.
    pub policy_excluded: usize,
    /// Capable providers dropped only because their quota is exhausted.
    pub quota_excluded: usize,
    /// Capable providers dropped because their last probe failed.
    pub unhealthy: usize,
}

impl Assessment {
    /// Error for an empty selection.
    pub fn unavailable_error(&self) -> GeocodingError {
        if self.quota_excluded > 0 {
            GeocodingError::QuotaExceeded
        } else {
            GeocodingError::NoProvider
        }
    }
}

/// Orders eligible providers for an operation.
pub struct ProviderSelector<'a> {
    providers: &'a [ProviderHandle],
    config: &'a dyn ConfigStore,
    health: &'a dyn HealthMonitor,
}

impl<'a> ProviderSelector<'a> {
    pub fn new(
        providers: &'a [ProviderHandle],
        config: &'a dyn ConfigStore,
        health: &'a dyn HealthMonitor,
    ) -> Self {
        Self {
            providers,
            config,
            health,
        }
    }

    /// Filter providers for `capability`, recording why capable ones were
    /// dropped.
    pub fn assess(
        &self,
        capability: Capability,
        exclude: impl Fn(&ProviderHandle) -> bool,
    ) -> Assessment {
        self.assess_where(|h| h.supports(capability), exclude)
    }

    /// Like [`assess`](Self::assess) with an arbitrary capability test.
    pub fn assess_where(
        &self,
        capable: impl Fn(&ProviderHandle) -> bool,
        exclude: impl Fn(&ProviderHandle) -> bool,
    ) -> Assessment {
        let mut assessment = Assessment::default();
        for handle in self.providers {
            if !handle.settings.enabled || !capable(handle) {
                continue;
            }
            if exclude(handle) {
                assessment.policy_excluded += 1;
                continue;
            }
            let healthy = self.health.is_healthy(handle.name());
            if self.config.is_quota_exceeded(handle.name()) {
                if healthy {
                    assessment.quota_excluded += 1;
                }
                continue;
            }
            if !healthy {
                assessment.unhealthy += 1;
                continue;
            }
            assessment.eligible.push(handle.clone());
        }
        assessment
    }

    /// Put the primary provider first. With `fallback` off only the primary
    /// is kept.
    pub fn order(
        &self,
        mut eligible: Vec<ProviderHandle>,
        preferred: Option<&str>,
        fallback: bool,
    ) -> Vec<ProviderHandle> {
        let recommended = self.health.recommended_provider();
        let primary = [preferred, recommended.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|name| eligible.iter().position(|h| h.name() == name));

        if let Some(idx) = primary {
            let handle = eligible.remove(idx);
            eligible.insert(0, handle);
        }
        if !fallback {
            eligible.truncate(1);
        }
        eligible
    }

    /// Ordered candidates for `capability`.
    ///
    /// Fails with [`GeocodingError::QuotaExceeded`] when some capable provider
    /// was dropped only for quota, else [`GeocodingError::NoProvider`].
    pub fn select(
        &self,
        capability: Capability,
        preferred: Option<&str>,
        fallback: bool,
        exclude: impl Fn(&ProviderHandle) -> bool,
    ) -> Result<Vec<ProviderHandle>> {
        let assessment = self.assess(capability, exclude);
        if assessment.eligible.is_empty() {
            return Err(assessment.unavailable_error());
        }
        Ok(self.order(assessment.eligible, preferred, fallback))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_error_prefers_quota() {
        let quota = Assessment {
            quota_excluded: 1,
            ..Assessment::default()
        };
        assert!(matches!(quota.unavailable_error(), GeocodingError::QuotaExceeded));
        assert!(matches!(
            Assessment::default().unavailable_error(),
            GeocodingError::NoProvider
        ));
    }
}
