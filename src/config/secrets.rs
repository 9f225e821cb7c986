//! Provider API keys kept outside the main config file.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{GeocodingError, Result};

/// API keys loaded from `secrets.toml`:
///
/// ```toml
/// [google]
/// api_key = "AIza..."
///
/// [mapbox]
/// api_key = "pk.eyJ..."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secrets {
    providers: BTreeMap<String, ProviderSecret>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProviderSecret {
    api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Resolution order:
    /// 1. `~/.geofacade/secrets.toml` (if exists, must be 0600)
    /// 2. `/etc/geofacade/secrets.toml` (if exists, must be 0600)
    ///
    /// Returns empty secrets if no file exists (keys may come from env vars).
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".geofacade").join("secrets.toml");
            if user_secrets.exists() {
                return Self::load_from(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/geofacade/secrets.toml");
        if system_secrets.exists() {
            return Self::load_from(&system_secrets);
        }

        Ok(Secrets::default())
    }

    /// Load one secrets file, rejecting group- or world-readable files.
    pub fn load_from(path: &Path) -> Result<Self> {
        Self::check_permissions(path)?;
        let content = fs::read_to_string(path).map_err(|e| {
            GeocodingError::Configuration(format!("Failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            GeocodingError::Configuration(format!("Failed to parse secrets file {path:?}: {e}"))
        })
    }

    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            GeocodingError::Configuration(format!("Failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(GeocodingError::Configuration(format!(
                "Secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// API key for `provider`, falling back to `GEOFACADE_<PROVIDER>_API_KEY`.
    pub fn api_key(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var(env_var_name(provider)).ok())
    }
}

/// `mapbox-eu` → `GEOFACADE_MAPBOX_EU_API_KEY`
pub fn env_var_name(provider: &str) -> String {
    let name: String = provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("GEOFACADE_{name}_API_KEY")
}
