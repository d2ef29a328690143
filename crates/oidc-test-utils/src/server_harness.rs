//! Mock OIDC issuer for end-to-end tests
//!
//! `MockIssuer` stands up a wiremock server that answers the discovery and
//! JWKS endpoints the way an identity provider would, and signs tokens with
//! a deterministic key published in its JWKS.

use crate::crypto_fixtures::TestKeypair;
use crate::token_builders::TestTokenBuilder;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Audience used by tokens and options produced by the harness.
pub const TEST_AUDIENCE: &str = "pam-oidc-test";

/// Path the harness serves its JWKS at.
pub const JWKS_PATH: &str = "/keys";

/// Mock identity provider.
pub struct MockIssuer {
    server: MockServer,
    keypair: TestKeypair,
}

impl MockIssuer {
    /// Start an issuer whose discovery document names its own URL.
    pub async fn start() -> Self {
        let issuer = Self::start_without_discovery().await;
        let issuer_url = issuer.issuer();
        issuer.mount_discovery(&issuer_url).await;
        issuer
    }

    /// Start an issuer whose discovery document claims `advertised_issuer`.
    pub async fn start_advertising(advertised_issuer: &str) -> Self {
        let issuer = Self::start_without_discovery().await;
        issuer.mount_discovery(advertised_issuer).await;
        issuer
    }

    async fn start_without_discovery() -> Self {
        let server = MockServer::start().await;
        let keypair = TestKeypair::new(1, "test-key-01").expect("Failed to create test keypair");

        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "keys": [keypair.jwk_json()] })),
            )
            .mount(&server)
            .await;

        Self { server, keypair }
    }

    async fn mount_discovery(&self, advertised_issuer: &str) {
        let document = serde_json::json!({
            "issuer": advertised_issuer,
            "jwks_uri": format!("{}{JWKS_PATH}", self.server.uri()),
            "id_token_signing_alg_values_supported": ["EdDSA"],
            "response_types_supported": ["id_token"],
            "subject_types_supported": ["public"]
        });

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(document))
            .mount(&self.server)
            .await;
    }

    /// The issuer URL (the mock server's base URL).
    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    /// The key tokens are signed with.
    pub fn keypair(&self) -> &TestKeypair {
        &self.keypair
    }

    /// A claims builder pre-filled with this issuer and [`TEST_AUDIENCE`].
    pub fn token_builder(&self) -> TestTokenBuilder {
        TestTokenBuilder::new(&self.issuer(), TEST_AUDIENCE)
    }

    /// Sign the claims in `builder` with the published key.
    pub fn sign(&self, builder: TestTokenBuilder) -> String {
        self.keypair.sign(&builder.build())
    }

    /// Module options pointing at this issuer, followed by `extra`.
    pub fn args(&self, extra: &[&str]) -> Vec<String> {
        let mut args = vec![
            format!("issuer={}", self.issuer()),
            format!("aud={TEST_AUDIENCE}"),
        ];
        args.extend(extra.iter().map(ToString::to_string));
        args
    }
}
