//! OIDC token verification.
//!
//! The policy engine only ever sees [`Claims`]; everything needed to get from
//! a raw bearer token to trusted claims lives here:
//!
//! - [`discovery`]: resolves an issuer's `openid-configuration` document
//! - [`jwks`]: fetches and caches the issuer's signing keys
//! - [`verifier`]: checks signature, lifetime, issuer and audience
//!
//! # Security
//!
//! - Verification error messages are generic and never include claim values
//! - Symmetric algorithms are never accepted, regardless of the JWKS
//! - All HTTP requests carry request and connect timeouts

pub mod discovery;
pub mod jwks;
pub mod verifier;

use crate::claims::Claims;
use async_trait::async_trait;
use common::jwt::JwtValidationError;
use std::time::Duration;
use thiserror::Error;

pub use discovery::discover;
pub use verifier::OidcVerifier;

/// Total request timeout for discovery and JWKS fetches.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Connect timeout for discovery and JWKS fetches.
pub const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Verifies raw identity tokens for a fixed issuer.
///
/// Implementations must be shareable across concurrent attempts.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify `raw_token` and check that it was issued for `audience`.
    async fn verify(&self, audience: &str, raw_token: &str) -> Result<Claims, VerificationError>;
}

/// Why a token failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error(transparent)]
    Rejected(#[from] JwtValidationError),

    #[error("unsupported signing algorithm {0}")]
    UnsupportedAlgorithm(String),

    #[error("no matching verification key")]
    KeyNotFound,

    #[error("verification key unusable")]
    InvalidKey,

    #[error("signature verification failed")]
    InvalidSignature,

    #[error("token is expired")]
    Expired,

    #[error("token is not yet valid")]
    NotYetValid,

    #[error("token issued by a different issuer")]
    InvalidIssuer,

    #[error("token not issued for this audience")]
    InvalidAudience,

    #[error("token claims malformed")]
    InvalidClaims,

    #[error("signing keys unavailable: {0}")]
    KeysUnavailable(String),
}

impl VerificationError {
    /// True when the failure is about reaching the issuer rather than the
    /// token itself.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VerificationError::KeysUnavailable(_))
    }
}

/// Errors building a verifier from an issuer URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("building http client: {0}")]
    HttpClient(String),

    #[error("fetching discovery document: {0}")]
    Request(String),

    #[error("discovery endpoint returned status {0}")]
    Status(u16),

    #[error("invalid discovery document: {0}")]
    InvalidDocument(String),

    #[error("issuer did not match the issuer returned by provider, expected {expected:?} got {actual:?}")]
    IssuerMismatch { expected: String, actual: String },
}

/// Build the HTTP client used for discovery and JWKS, optionally routed
/// through `proxy`.
///
/// # Errors
///
/// Returns [`DiscoveryError::HttpClient`] if the proxy URL is invalid or the
/// TLS backend cannot be initialized.
pub fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client, DiscoveryError> {
    let mut builder = reqwest::Client::builder()
        .timeout(HTTP_REQUEST_TIMEOUT)
        .connect_timeout(HTTP_CONNECT_TIMEOUT);

    if let Some(proxy) = proxy.filter(|p| !p.is_empty()) {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| DiscoveryError::HttpClient(format!("invalid http_proxy: {e}")))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| DiscoveryError::HttpClient(e.to_string()))
}
