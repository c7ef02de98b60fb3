//! Authenticated request layer with transparent token refresh.
//!
//! `CloudSession` issues one logical list request against a cloud. A 401
//! triggers at most one refresh through the shared refresh gate, after
//! which the original request is reissued exactly once with the new
//! token. A failed refresh records the connect error on the cloud and
//! surfaces the original 401; non-auth errors are returned verbatim with
//! their status.

use std::sync::Arc;

use nimbus_domain::{Cloud, NimbusError, ResourceKind};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::ports::{AuthConnector, EntityClient};

/// Errors produced by the authenticated request layer.
#[derive(Debug, Error)]
pub enum RequestError {
    /// The cloud has no usable credentials; fails fast, no retry.
    #[error("cloud is not connected: {0}")]
    NotConnected(String),

    /// The endpoint answered with a non-2xx status.
    #[error("request failed with status {status}: {message}")]
    Http { status: u16, message: String },

    /// Network-level failure before any HTTP status was produced.
    #[error("transport error: {0}")]
    Transport(String),
}

impl RequestError {
    /// HTTP status of the failure, if one was produced.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::NotConnected(_) | Self::Transport(_) => None,
        }
    }

    /// Permission gaps are expected and routine; callers downgrade them.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        self.status() == Some(403)
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Successful list reply plus whether a refresh happened on the way.
#[derive(Debug)]
pub struct ListReply {
    pub body: Value,
    pub tokens_refreshed: bool,
}

/// Per-cloud authenticated session.
///
/// The cloud is shared mutable state: this layer replaces its tokens on
/// refresh and records its connect error on terminal auth failures.
/// Everything else reads it through [`CloudSession::snapshot`].
pub struct CloudSession {
    cloud: Arc<RwLock<Cloud>>,
    entities: Arc<dyn EntityClient>,
    auth: Arc<dyn AuthConnector>,
    /// Serializes refreshes so concurrent 401s from a fan-out collapse
    /// into one refresh instead of a refresh storm.
    refresh_gate: Mutex<()>,
}

impl CloudSession {
    pub fn new(cloud: Cloud, entities: Arc<dyn EntityClient>, auth: Arc<dyn AuthConnector>) -> Self {
        Self { cloud: Arc::new(RwLock::new(cloud)), entities, auth, refresh_gate: Mutex::new(()) }
    }

    /// Shared handle to the cloud, for the orchestrator that owns it.
    #[must_use]
    pub fn cloud_handle(&self) -> Arc<RwLock<Cloud>> {
        Arc::clone(&self.cloud)
    }

    /// Point-in-time copy of the cloud.
    pub async fn snapshot(&self) -> Cloud {
        self.cloud.read().await.clone()
    }

    /// Whether the cloud's capability flags enable fetching `kind`.
    pub async fn kind_enabled(&self, kind: ResourceKind) -> bool {
        let cloud = self.cloud.read().await;
        let caps = cloud.config.clone().unwrap_or_default();
        match kind {
            ResourceKind::Credential => caps.credentials_enabled,
            ResourceKind::SshKey => caps.ssh_keys_enabled,
            ResourceKind::Proxy => caps.proxies_enabled,
            ResourceKind::License => caps.licenses_enabled,
            ResourceKind::Namespace | ResourceKind::Cluster | ResourceKind::UpdateHistory => true,
        }
    }

    /// Issue one authenticated list request.
    ///
    /// # Errors
    /// `NotConnected` when the cloud has no credentials (tokens are
    /// cleared as a side effect), `Http` for non-2xx responses after the
    /// single refresh-and-retry, `Transport` for network failures.
    pub async fn list(
        &self,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<ListReply, RequestError> {
        let (cloud_url, token) = self.credentials().await?;

        let outcome = self
            .entities
            .list(&cloud_url, kind, &token, namespace)
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        if outcome.status != 401 {
            return Self::finish(outcome, false);
        }

        // Expired credentials: refresh once, then reissue exactly once.
        let Some(new_token) = self.refresh_once(&cloud_url, &token).await else {
            return Err(RequestError::Http { status: 401, message: outcome.message() });
        };

        let retried = self
            .entities
            .list(&cloud_url, kind, &new_token, namespace)
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        Self::finish(retried, true)
    }

    fn finish(outcome: crate::ports::ListOutcome, refreshed: bool) -> Result<ListReply, RequestError> {
        if outcome.is_success() {
            Ok(ListReply { body: outcome.body, tokens_refreshed: refreshed })
        } else {
            Err(RequestError::Http { status: outcome.status, message: outcome.message() })
        }
    }

    async fn credentials(&self) -> Result<(String, String), RequestError> {
        {
            let cloud = self.cloud.read().await;
            if cloud.connected() {
                if let Some(token) = cloud.access_token() {
                    return Ok((cloud.cloud_url.clone(), token.to_string()));
                }
            }
        }

        // No usable credentials: clear whatever is left so the host sees
        // a clean disconnected cloud.
        let mut cloud = self.cloud.write().await;
        cloud.reset_tokens();
        Err(RequestError::NotConnected(cloud.cloud_url.clone()))
    }

    /// Refresh the cloud's tokens, deduplicating concurrent callers.
    ///
    /// Returns the access token to retry with, or `None` when the
    /// refresh failed terminally (connect error already recorded).
    async fn refresh_once(&self, cloud_url: &str, stale_token: &str) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        // Another request may have refreshed while we waited on the gate.
        let refresh_token = {
            let cloud = self.cloud.read().await;
            match cloud.access_token() {
                Some(current) if current != stale_token => {
                    debug!(cloud = cloud_url, "token already refreshed by a sibling request");
                    return Some(current.to_string());
                }
                _ => cloud.refresh_token().map(ToString::to_string),
            }
        };

        let Some(refresh_token) = refresh_token else {
            warn!(cloud = cloud_url, "401 with no refresh token available");
            self.cloud.write().await.set_connect_error("no refresh token available");
            return None;
        };

        match self.auth.refresh(cloud_url, &refresh_token).await {
            Ok(tokens) => {
                let access = tokens.access_token.clone();
                self.cloud.write().await.update_tokens(tokens);
                debug!(cloud = cloud_url, "access token refreshed");
                Some(access)
            }
            Err(err) => {
                warn!(cloud = cloud_url, error = %err, "token refresh failed");
                self.cloud.write().await.set_connect_error(err.to_string());
                None
            }
        }
    }
}
