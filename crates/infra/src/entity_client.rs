//! Reqwest-backed resource-entity client.
//!
//! One client serves every resource kind by routing the kind to its
//! endpoint path. Status classification stays in the engine: any
//! response the server produced is a successful [`ListOutcome`], only
//! transport failures become errors.

use std::time::Duration;

use async_trait::async_trait;
use nimbus_core::ports::{EntityClient, ListOutcome};
use nimbus_domain::{NimbusError, ResourceKind};
use tracing::debug;
use url::Url;

const USER_AGENT: &str = concat!("nimbus-sync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of [`EntityClient`].
#[derive(Clone)]
pub struct HttpEntityClient {
    client: reqwest::Client,
}

impl HttpEntityClient {
    /// Build a client with the default timeout and user agent.
    ///
    /// # Errors
    /// Returns `NimbusError::Internal` when the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, NimbusError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| NimbusError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    fn endpoint(
        cloud_url: &str,
        kind: ResourceKind,
        namespace: Option<&str>,
    ) -> Result<Url, NimbusError> {
        let mut url = Url::parse(cloud_url)
            .map_err(|err| NimbusError::Config(format!("invalid cloud URL {cloud_url}: {err}")))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| NimbusError::Config(format!("cloud URL {cloud_url} cannot be a base")))?;
            segments.pop_if_empty();
            segments.extend(["apis", "nimbus", "v1"]);
            if let Some(namespace) = namespace {
                segments.extend(["namespaces", namespace]);
            }
            segments.push(collection_segment(kind));
        }
        Ok(url)
    }
}

/// URL path segment for each kind's collection endpoint.
fn collection_segment(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Namespace => "namespaces",
        ResourceKind::Cluster => "clusters",
        ResourceKind::Credential => "credentials",
        ResourceKind::SshKey => "sshkeys",
        ResourceKind::Proxy => "proxies",
        ResourceKind::License => "licenses",
        ResourceKind::UpdateHistory => "updatehistories",
    }
}

#[async_trait]
impl EntityClient for HttpEntityClient {
    async fn list(
        &self,
        cloud_url: &str,
        kind: ResourceKind,
        token: &str,
        namespace: Option<&str>,
    ) -> Result<ListOutcome, NimbusError> {
        let url = Self::endpoint(cloud_url, kind, namespace)?;
        debug!(%url, kind = %kind, "listing resources");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| NimbusError::Network(format!("list {kind} failed: {err}")))?;

        let status = response.status().as_u16();
        // Error bodies are often not JSON; fall back to null so the
        // caller still sees the status.
        let body = response.json().await.unwrap_or(serde_json::Value::Null);

        Ok(ListOutcome { status, body })
    }
}
