//! Cloud connection state and token types.
//!
//! A `Cloud` describes one configured management-plane endpoint: its
//! credentials, connection status, capabilities, and the namespace sync
//! selection the user made for it. The authenticated request layer
//! mutates the token fields on refresh; everything else mutates it only
//! through explicit methods.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connection status of a cloud.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Access and refresh tokens with expiry metadata.
///
/// Optional refresh token because some identity providers do not issue
/// them. `expires_at` is calculated from `expires_in` at creation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    /// Absolute expiration timestamp (UTC).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a new `TokenSet` with a calculated expiration time.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_at = if expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(expires_in))
        } else {
            None
        };

        Self { access_token, refresh_token, expires_in, expires_at }
    }

    /// Check if the access token is expired or will expire within the
    /// given threshold.
    ///
    /// Returns `false` when no expiry is set.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let threshold = chrono::Duration::seconds(threshold_seconds);
                Utc::now() + threshold >= expires_at
            }
            None => false,
        }
    }

    /// Seconds until token expiration, or `None` if no expiry is set.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}

/// One configured management-plane endpoint.
///
/// Identity is the endpoint URL. The sync engine holds this behind a
/// shared handle; the request layer replaces `tokens` on refresh and
/// records `connect_error` when a refresh fails terminally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cloud {
    /// Endpoint URL, the cloud's identity.
    pub cloud_url: String,
    /// Display name shown on catalog entities.
    pub name: String,
    pub status: ConnectionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<TokenSet>,
    /// Feature flags loaded from the endpoint, `None` until first load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<crate::config::CloudCapabilities>,
    /// Last terminal connection error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_error: Option<String>,
    /// Namespaces the user chose to sync into the catalog.
    pub synced_namespaces: Vec<String>,
    /// Namespaces the user explicitly excluded.
    pub ignored_namespaces: Vec<String>,
    /// When set, newly discovered namespaces are synced by default.
    pub sync_all: bool,
}

impl Cloud {
    /// Create a disconnected cloud for the given endpoint.
    #[must_use]
    pub fn new(cloud_url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cloud_url: cloud_url.into(),
            name: name.into(),
            status: ConnectionStatus::Disconnected,
            tokens: None,
            config: None,
            connect_error: None,
            synced_namespaces: Vec::new(),
            ignored_namespaces: Vec::new(),
            sync_all: false,
        }
    }

    /// Whether the cloud has credentials and is usable for requests.
    #[must_use]
    pub fn connected(&self) -> bool {
        self.status == ConnectionStatus::Connected && self.tokens.is_some()
    }

    /// Current access token, if any.
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|t| t.access_token.as_str())
    }

    /// Current refresh token, if any.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.tokens.as_ref().and_then(|t| t.refresh_token.as_deref())
    }

    /// Replace the token set after a successful login or refresh.
    ///
    /// Also clears any previous connect error and marks the cloud
    /// connected.
    pub fn update_tokens(&mut self, tokens: TokenSet) {
        self.tokens = Some(tokens);
        self.connect_error = None;
        self.status = ConnectionStatus::Connected;
    }

    /// Drop all credentials and disconnect.
    pub fn reset_tokens(&mut self) {
        self.tokens = None;
        self.status = ConnectionStatus::Disconnected;
    }

    /// Record a terminal connection error (failed refresh, unreachable
    /// endpoint).
    pub fn set_connect_error(&mut self, message: impl Into<String>) {
        self.connect_error = Some(message.into());
        self.status = ConnectionStatus::Error;
    }

    /// Reconcile the synced/ignored bookkeeping against the namespaces
    /// that actually exist on the server.
    ///
    /// Namespaces that vanished are dropped from both lists; newly
    /// discovered ones are added to whichever list matches the
    /// `sync_all` policy.
    pub fn reconcile_namespaces(&mut self, existing: &[String]) {
        self.synced_namespaces.retain(|name| existing.iter().any(|n| n == name));
        self.ignored_namespaces.retain(|name| existing.iter().any(|n| n == name));

        for name in existing {
            let known = self.synced_namespaces.iter().any(|n| n == name)
                || self.ignored_namespaces.iter().any(|n| n == name);
            if !known {
                if self.sync_all {
                    self.synced_namespaces.push(name.clone());
                } else {
                    self.ignored_namespaces.push(name.clone());
                }
            }
        }
    }

    /// Whether the given namespace is selected for catalog sync.
    #[must_use]
    pub fn is_synced(&self, namespace: &str) -> bool {
        self.synced_namespaces.iter().any(|n| n == namespace)
    }
}
