//! OIDC provider discovery.
//!
//! Resolves `<issuer>/.well-known/openid-configuration` and builds an
//! [`OidcVerifier`] backed by the advertised `jwks_uri`.

use super::jwks::JwksClient;
use super::{DiscoveryError, OidcVerifier};
use jsonwebtoken::Algorithm;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

const WELL_KNOWN_PATH: &str = "/.well-known/openid-configuration";

/// The members of a provider metadata document this crate uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderMetadata {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

/// Discovery document URL for `issuer`.
#[must_use]
pub fn discovery_url(issuer: &str) -> String {
    format!("{}{WELL_KNOWN_PATH}", issuer.trim_end_matches('/'))
}

/// Fetch the provider metadata for `issuer`.
///
/// # Errors
///
/// Returns a [`DiscoveryError`] if the document cannot be fetched or parsed,
/// or if it names a different issuer than the one configured.
#[instrument(skip(http_client))]
pub async fn fetch_metadata(
    issuer: &str,
    http_client: &reqwest::Client,
) -> Result<ProviderMetadata, DiscoveryError> {
    let url = discovery_url(issuer);
    tracing::debug!(target: "pam_oidc.oidc.discovery", url = %url, "Fetching discovery document");

    let response = http_client.get(&url).send().await.map_err(|e| {
        tracing::error!(target: "pam_oidc.oidc.discovery", error = %e, "Failed to fetch discovery document");
        DiscoveryError::Request(e.to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::error!(target: "pam_oidc.oidc.discovery", status = %status, "Discovery endpoint returned error");
        return Err(DiscoveryError::Status(status.as_u16()));
    }

    let metadata: ProviderMetadata = response
        .json()
        .await
        .map_err(|e| DiscoveryError::InvalidDocument(e.to_string()))?;

    if metadata.issuer != issuer {
        tracing::warn!(
            target: "pam_oidc.oidc.discovery",
            expected = %issuer,
            actual = %metadata.issuer,
            "Discovery document names a different issuer"
        );
        return Err(DiscoveryError::IssuerMismatch {
            expected: issuer.to_string(),
            actual: metadata.issuer,
        });
    }

    Ok(metadata)
}

/// Discover `issuer` and build a verifier for its ID tokens.
///
/// # Errors
///
/// See [`fetch_metadata`].
pub async fn discover(
    issuer: &str,
    http_client: reqwest::Client,
) -> Result<OidcVerifier, DiscoveryError> {
    let metadata = fetch_metadata(issuer, &http_client).await?;

    let algorithms: Vec<Algorithm> = metadata
        .id_token_signing_alg_values_supported
        .iter()
        .filter_map(|alg| Algorithm::from_str(alg).ok())
        .collect();

    tracing::info!(
        target: "pam_oidc.oidc.discovery",
        jwks_uri = %metadata.jwks_uri,
        algorithms = ?algorithms,
        "Discovered OIDC provider"
    );

    let jwks_client = Arc::new(JwksClient::new(metadata.jwks_uri, http_client));
    let verifier = OidcVerifier::new(metadata.issuer, jwks_client);

    Ok(if algorithms.is_empty() {
        verifier
    } else {
        verifier.with_supported_algorithms(algorithms)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve_document(body: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN_PATH))
            .respond_with(body)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_discovery_url_strips_trailing_slash() {
        assert_eq!(
            discovery_url("https://idp.example.com/"),
            "https://idp.example.com/.well-known/openid-configuration"
        );
        assert_eq!(
            discovery_url("https://idp.example.com/realms/a"),
            "https://idp.example.com/realms/a/.well-known/openid-configuration"
        );
    }

    #[tokio::test]
    async fn test_discover_builds_verifier() {
        let server = MockServer::start().await;
        let issuer = server.uri();
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": issuer,
                "jwks_uri": format!("{issuer}/keys"),
                "id_token_signing_alg_values_supported": ["EdDSA", "RS256", "bogus"]
            })))
            .mount(&server)
            .await;

        let verifier = discover(&issuer, reqwest::Client::new()).await.unwrap();
        assert_eq!(verifier.issuer(), issuer);
    }

    #[tokio::test]
    async fn test_issuer_mismatch_rejected() {
        let server = serve_document(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": "https://evil.example.com",
            "jwks_uri": "https://evil.example.com/keys"
        })))
        .await;

        let err = fetch_metadata(&server.uri(), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::IssuerMismatch { .. }));
    }

    #[tokio::test]
    async fn test_trailing_slash_issuer_must_match_exactly() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": server.uri(),
                "jwks_uri": format!("{}/keys", server.uri())
            })))
            .mount(&server)
            .await;

        let err = fetch_metadata(&format!("{}/", server.uri()), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::IssuerMismatch { .. }));
    }

    #[tokio::test]
    async fn test_error_status() {
        let server = serve_document(ResponseTemplate::new(404)).await;
        let err = fetch_metadata(&server.uri(), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert_eq!(err, DiscoveryError::Status(404));
    }

    #[tokio::test]
    async fn test_missing_jwks_uri() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(WELL_KNOWN_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "issuer": server.uri() })))
            .mount(&server)
            .await;

        let err = fetch_metadata(&server.uri(), &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_unreachable_issuer() {
        let err = fetch_metadata("http://127.0.0.1:9", &reqwest::Client::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DiscoveryError::Request(_)));
    }
}
