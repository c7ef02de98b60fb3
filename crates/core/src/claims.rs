//! Read-only role claims from the access token.
//!
//! The JWT payload segment is decoded without signature verification;
//! the server remains the authority on every request. The claims are
//! used only to skip namespaces the caller cannot read, avoiding a
//! pointless 403 fan-out. A token we cannot parse fails open: no
//! filtering, the server will deny what it denies.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

/// Role claims embedded in the access token payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Decode the payload segment of a JWT. Returns `None` for tokens
    /// that are not three-segment JWTs or whose payload is not JSON.
    #[must_use]
    pub fn parse(access_token: &str) -> Option<Self> {
        let payload = access_token.split('.').nth(1)?;
        let decoded = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
        serde_json::from_slice(&decoded).ok()
    }

    /// Whether the caller may list namespaced resources in `namespace`.
    #[must_use]
    pub fn can_read_namespace(&self, namespace: &str) -> bool {
        self.roles.iter().any(|role| {
            role == "cloud-admin"
                || role.strip_prefix("reader:").is_some_and(|scope| scope == namespace)
        })
    }
}

/// Filter `namespaces` down to the ones the token grants read access to.
///
/// An unparseable or absent token applies no filtering.
#[must_use]
pub fn readable_namespaces(access_token: Option<&str>, namespaces: Vec<String>) -> Vec<String> {
    let Some(claims) = access_token.and_then(TokenClaims::parse) else {
        debug!("no parseable role claims in token; skipping namespace permission filter");
        return namespaces;
    };

    namespaces.into_iter().filter(|ns| claims.can_read_namespace(ns)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with_roles(roles: &[&str]) -> String {
        let payload = serde_json::json!({ "roles": roles });
        let encoded = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("header.{encoded}.signature")
    }

    #[test]
    fn parses_roles_from_payload_segment() {
        let token = jwt_with_roles(&["reader:team-a", "cloud-admin"]);
        let claims = TokenClaims::parse(&token).unwrap();
        assert_eq!(claims.roles.len(), 2);
    }

    #[test]
    fn admin_reads_everything() {
        let claims = TokenClaims { roles: vec!["cloud-admin".into()] };
        assert!(claims.can_read_namespace("anything"));
    }

    #[test]
    fn reader_role_is_namespace_scoped() {
        let claims = TokenClaims { roles: vec!["reader:team-a".into()] };
        assert!(claims.can_read_namespace("team-a"));
        assert!(!claims.can_read_namespace("team-b"));
    }

    #[test]
    fn filter_applies_claims() {
        let token = jwt_with_roles(&["reader:team-a"]);
        let kept = readable_namespaces(
            Some(&token),
            vec!["team-a".to_string(), "team-b".to_string()],
        );
        assert_eq!(kept, vec!["team-a".to_string()]);
    }

    #[test]
    fn opaque_token_fails_open() {
        let kept =
            readable_namespaces(Some("not-a-jwt"), vec!["team-a".to_string(), "team-b".to_string()]);
        assert_eq!(kept.len(), 2);

        let kept = readable_namespaces(None, vec!["team-a".to_string()]);
        assert_eq!(kept.len(), 1);
    }
}
