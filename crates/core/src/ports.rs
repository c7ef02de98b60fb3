//! Ports to the external collaborators of the sync engine.
//!
//! The engine never talks HTTP itself; it goes through these traits so
//! tests can swap in mocks and the transport stays replaceable.

use async_trait::async_trait;
use nimbus_domain::{CloudCapabilities, NimbusError, ResourceKind, TokenSet};

/// Outcome of one list request against a resource-entity endpoint.
///
/// Non-2xx responses are still outcomes, not errors: the request layer
/// owns status classification (401 refresh, 403/404 downgrades). Only
/// transport-level failures surface as `Err`.
#[derive(Debug, Clone)]
pub struct ListOutcome {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ListOutcome {
    /// Whether the response status is in the 2xx range.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Best-effort error message extracted from the body.
    #[must_use]
    pub fn message(&self) -> String {
        self.body
            .get("message")
            .and_then(|m| m.as_str())
            .map_or_else(|| format!("status {}", self.status), ToString::to_string)
    }
}

/// One client per resource-type family exposing a list operation.
///
/// Implementations route `kind` to the right endpoint; namespaced kinds
/// take the namespace to scope the request, cluster-scoped kinds pass
/// `None`.
#[async_trait]
pub trait EntityClient: Send + Sync {
    /// List items of `kind`, authenticated with `token`.
    ///
    /// # Errors
    /// Returns `NimbusError::Network` for transport-level failures
    /// (DNS, connect, timeout). HTTP error statuses are returned as
    /// successful `ListOutcome`s.
    async fn list(
        &self,
        cloud_url: &str,
        kind: ResourceKind,
        token: &str,
        namespace: Option<&str>,
    ) -> Result<ListOutcome, NimbusError>;
}

/// Identity-provider operations for one cloud endpoint.
#[async_trait]
pub trait AuthConnector: Send + Sync {
    /// Exchange a refresh token for a new token set.
    ///
    /// # Errors
    /// Returns `NimbusError::Auth` when the provider rejects the
    /// refresh token, `NimbusError::Network` for transport failures.
    async fn refresh(&self, cloud_url: &str, refresh_token: &str) -> Result<TokenSet, NimbusError>;

    /// Load the cloud's capability flags.
    ///
    /// # Errors
    /// Returns `NimbusError::Network` or `NimbusError::Config` when the
    /// endpoint is unreachable or the payload is malformed.
    async fn load_capabilities(&self, cloud_url: &str) -> Result<CloudCapabilities, NimbusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_success_range() {
        let ok = ListOutcome { status: 204, body: serde_json::Value::Null };
        assert!(ok.is_success());
        let err = ListOutcome { status: 500, body: serde_json::Value::Null };
        assert!(!err.is_success());
    }

    #[test]
    fn outcome_message_prefers_body() {
        let outcome =
            ListOutcome { status: 403, body: serde_json::json!({ "message": "forbidden" }) };
        assert_eq!(outcome.message(), "forbidden");

        let bare = ListOutcome { status: 502, body: serde_json::Value::Null };
        assert_eq!(bare.message(), "status 502");
    }
}
