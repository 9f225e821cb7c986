//! Per-provider status snapshot.

use serde::Serialize;

use crate::config::{QuotaLimits, QuotaUsage};
use crate::health::ProviderHealth;
use crate::types::{ProviderCapabilities, ProviderKind};

/// What the facade knows about one configured provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    /// A client is built and can be selected.
    pub active: bool,
    pub capabilities: ProviderCapabilities,
    /// `None` until the first health probe completes.
    pub health: Option<ProviderHealth>,
    pub quota_usage: QuotaUsage,
    pub quota_limits: QuotaLimits,
    pub quota_exceeded: bool,
    pub has_api_key: bool,
}
