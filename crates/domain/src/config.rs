//! Configuration structures for the sync engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-cloud feature flags reported by the management plane.
///
/// A disabled kind is never fetched; the fetcher skips it with zero
/// requests instead of fetching and filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudCapabilities {
    #[serde(default = "default_true")]
    pub credentials_enabled: bool,
    #[serde(default = "default_true")]
    pub ssh_keys_enabled: bool,
    #[serde(default = "default_true")]
    pub proxies_enabled: bool,
    #[serde(default = "default_true")]
    pub licenses_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CloudCapabilities {
    fn default() -> Self {
        Self {
            credentials_enabled: true,
            ssh_keys_enabled: true,
            proxies_enabled: true,
            licenses_enabled: true,
        }
    }
}

/// Settings shared by every `DataCloud` built by the sync manager.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Interval between fetch cycles.
    ///
    /// Deliberately shorter than the typical five minute access token
    /// lifetime so that the namespace request, the first in every cycle,
    /// is the one that triggers a refresh. The dependent fan-out then
    /// runs on the fresh token instead of racing refreshes of its own.
    pub fetch_interval: Duration,
    /// Preview clouds skip proxies and licenses and keep per-namespace
    /// counts instead of materialized collections.
    pub preview: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self { fetch_interval: Duration::from_secs(285), preview: false }
    }
}
