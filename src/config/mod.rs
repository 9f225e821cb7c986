//! Configuration for the geocoding facade.
//!
//! Settings are plain serde types so they can be loaded from TOML, built in
//! code, or pushed from a settings UI through a [`ConfigStore`]. Resolution
//! order for [`GeocodingSettings::load`]:
//! 1. Explicit path (if provided)
//! 2. `~/.geofacade/config.toml` (user)
//! 3. `/etc/geofacade/config.toml` (system)

mod quota;
mod secrets;
mod store;

pub use quota::{QuotaLimits, QuotaTracker, QuotaUsage};
pub use secrets::{Secrets, env_var_name};
pub use store::{ConfigStore, InMemoryConfigStore};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{ProviderCapabilities, ProviderKind};
use crate::{GeocodingError, Result};

/// Name of the OpenStreetMap provider in the default configuration.
pub const DEFAULT_OPEN_PROVIDER: &str = "openstreetmap";

/// Top-level facade settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodingSettings {
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub search: SearchSettings,
    /// Providers in configured (priority) order.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSettings>,
    /// Usage ceilings keyed by provider name.
    #[serde(default)]
    pub quotas: BTreeMap<String, QuotaLimits>,
}

impl Default for GeocodingSettings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            search: SearchSettings::default(),
            providers: default_providers(),
            quotas: BTreeMap::new(),
        }
    }
}

fn default_providers() -> Vec<ProviderSettings> {
    vec![ProviderSettings::new(
        DEFAULT_OPEN_PROVIDER,
        ProviderKind::OpenStreetMap,
    )]
}

/// Result cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Caching on/off (default: on).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Time-to-live of new entries in seconds (default: 3600).
    #[serde(default = "default_cache_duration")]
    pub duration_secs: u64,
    /// Maximum number of cached responses (default: 500).
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// Interval of the background prune in seconds (default: 60).
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_secs: default_cache_duration(),
            max_entries: default_max_entries(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_duration() -> u64 {
    3600
}

fn default_max_entries() -> u64 {
    500
}

fn default_prune_interval() -> u64 {
    60
}

/// Restriction applied on top of availability when picking providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyMode {
    #[default]
    Normal,
    /// The open provider is never used for autocomplete.
    Strict,
}

/// Search behaviour settings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Serve only cached results while the network is unreachable.
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub policy_mode: PolicyMode,
    /// Try further providers when the primary fails (default: on).
    #[serde(default = "default_true")]
    pub auto_fallback: bool,
    /// Per-attempt timeout in milliseconds (default: 10000).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Health probe interval in seconds (default: 300). Applied to the
    /// health monitor on every reconfiguration.
    #[serde(default = "default_health_interval")]
    pub health_check_interval_secs: u64,
    /// Provider excluded from autocomplete under [`PolicyMode::Strict`].
    #[serde(default = "default_open_provider")]
    pub open_provider: String,
}

impl SearchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    /// Whether `provider` may not serve autocomplete under the current policy.
    pub fn is_policy_restricted(&self, provider: &str) -> bool {
        self.policy_mode == PolicyMode::Strict && provider == self.open_provider
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            offline_mode: false,
            policy_mode: PolicyMode::default(),
            auto_fallback: true,
            request_timeout_ms: default_request_timeout(),
            health_check_interval_secs: default_health_interval(),
            open_provider: default_open_provider(),
        }
    }
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_health_interval() -> u64 {
    300
}

fn default_open_provider() -> String {
    DEFAULT_OPEN_PROVIDER.to_string()
}

/// One configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Unique name used for routing, quotas and API keys.
    pub name: String,
    pub kind: ProviderKind,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Override of the provider's public endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Default response language.
    #[serde(default)]
    pub language: Option<String>,
    /// Sent as `User-Agent` (required by the Nominatim usage policy).
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Override of the capability flags implied by `kind`.
    #[serde(default)]
    pub capabilities: Option<ProviderCapabilities>,
}

impl ProviderSettings {
    pub fn new(name: impl Into<String>, kind: ProviderKind) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            base_url: None,
            language: None,
            user_agent: None,
            capabilities: None,
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn capabilities(mut self, caps: ProviderCapabilities) -> Self {
        self.capabilities = Some(caps);
        self
    }

    /// Declared capabilities: the override, else full support.
    pub fn effective_capabilities(&self) -> ProviderCapabilities {
        self.capabilities.unwrap_or_else(ProviderCapabilities::full)
    }
}

impl GeocodingSettings {
    /// Parse settings from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| GeocodingError::Configuration(format!("Failed to parse config: {e}")))
    }

    /// Load settings from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            GeocodingError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GeocodingError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    /// Load settings, or fall back to defaults when no file exists.
    ///
    /// An explicit path that does not exist is still an error.
    pub fn load_or_default(explicit_path: Option<&Path>) -> Result<Self> {
        match Self::load(explicit_path) {
            Err(GeocodingError::Configuration(msg))
                if explicit_path.is_none() && msg.starts_with("No config file found") =>
            {
                Ok(Self::default())
            }
            other => other,
        }
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(GeocodingError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".geofacade").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/geofacade/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(GeocodingError::Configuration(
            "No config file found. Create ~/.geofacade/config.toml or /etc/geofacade/config.toml"
                .to_string(),
        ))
    }

    /// Reject settings the facade cannot run with.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                return Err(GeocodingError::Configuration(
                    "provider name must not be empty".to_string(),
                ));
            }
            if !seen.insert(provider.name.as_str()) {
                return Err(GeocodingError::Configuration(format!(
                    "duplicate provider name '{}'",
                    provider.name
                )));
            }
        }
        if self.search.request_timeout_ms == 0 {
            return Err(GeocodingError::Configuration(
                "search.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(GeocodingError::Configuration(
                "cache.max_entries must be greater than zero when caching is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderSettings> {
        self.providers.iter().find(|p| p.name == name)
    }

    /// Quota limits for a provider (unlimited if unset).
    pub fn quota_limits(&self, name: &str) -> QuotaLimits {
        self.quotas.get(name).copied().unwrap_or_default()
    }
}
