//! Reqwest-backed identity-provider connector.

use std::time::Duration;

use async_trait::async_trait;
use nimbus_core::ports::AuthConnector;
use nimbus_domain::{CloudCapabilities, NimbusError, TokenSet};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of [`AuthConnector`].
#[derive(Clone)]
pub struct HttpAuthConnector {
    client: reqwest::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    grant_type: &'static str,
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenReply {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

impl HttpAuthConnector {
    /// # Errors
    /// Returns `NimbusError::Internal` when the TLS backend cannot be
    /// initialized.
    pub fn new() -> Result<Self, NimbusError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| NimbusError::Internal(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    fn join(cloud_url: &str, segments: &[&str]) -> Result<Url, NimbusError> {
        let mut url = Url::parse(cloud_url)
            .map_err(|err| NimbusError::Config(format!("invalid cloud URL {cloud_url}: {err}")))?;
        {
            let mut parts = url
                .path_segments_mut()
                .map_err(|()| NimbusError::Config(format!("cloud URL {cloud_url} cannot be a base")))?;
            parts.pop_if_empty();
            parts.extend(segments);
        }
        Ok(url)
    }
}

#[async_trait]
impl AuthConnector for HttpAuthConnector {
    async fn refresh(&self, cloud_url: &str, refresh_token: &str) -> Result<TokenSet, NimbusError> {
        let url = Self::join(cloud_url, &["auth", "token"])?;
        debug!(cloud = %cloud_url, "exchanging refresh token");

        let response = self
            .client
            .post(url)
            .json(&RefreshRequest { grant_type: "refresh_token", refresh_token })
            .send()
            .await
            .map_err(|err| NimbusError::Network(format!("token refresh failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NimbusError::Auth(format!(
                "token endpoint rejected refresh with status {status}"
            )));
        }

        let reply: TokenReply = response
            .json()
            .await
            .map_err(|err| NimbusError::Auth(format!("malformed token response: {err}")))?;

        Ok(TokenSet::new(reply.access_token, reply.refresh_token, reply.expires_in))
    }

    async fn load_capabilities(&self, cloud_url: &str) -> Result<CloudCapabilities, NimbusError> {
        let url = Self::join(cloud_url, &["apis", "nimbus", "v1", "capabilities"])?;
        debug!(cloud = %cloud_url, "loading cloud capabilities");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| NimbusError::Network(format!("capability load failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NimbusError::Config(format!(
                "capability endpoint returned status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|err| NimbusError::Config(format!("malformed capability response: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    #[tokio::test]
    async fn refresh_exchanges_the_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .and(body_partial_json(serde_json::json!({ "refreshToken": "r-1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "accessToken": "a-2",
                "refreshToken": "r-2",
                "expiresIn": 300
            })))
            .expect(1)
            .mount(&server)
            .await;

        let connector = HttpAuthConnector::new().unwrap();
        let tokens = connector.refresh(&server.uri(), "r-1").await.unwrap();

        assert_eq!(tokens.access_token, "a-2");
        assert_eq!(tokens.refresh_token.as_deref(), Some("r-2"));
        assert_eq!(tokens.expires_in, 300);
    }

    #[tokio::test]
    async fn rejected_refresh_is_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let connector = HttpAuthConnector::new().unwrap();
        let err = connector.refresh(&server.uri(), "stale").await.unwrap_err();
        assert!(matches!(err, NimbusError::Auth(_)));
    }

    #[tokio::test]
    async fn capabilities_deserialize_with_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/apis/nimbus/v1/capabilities"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "proxiesEnabled": false
            })))
            .mount(&server)
            .await;

        let connector = HttpAuthConnector::new().unwrap();
        let caps = connector.load_capabilities(&server.uri()).await.unwrap();
        assert!(!caps.proxies_enabled);
        assert!(caps.credentials_enabled);
    }
}
