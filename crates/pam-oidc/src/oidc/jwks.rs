//! JWKS client for fetching and caching an issuer's signing keys.
//!
//! Keys are fetched from the `jwks_uri` advertised in the issuer's discovery
//! document and cached with a TTL so repeated logins within a short window
//! do not hit the identity provider every time.

use super::VerificationError;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::instrument;

/// Default cache TTL (5 minutes).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// JSON Web Key as published by an OIDC provider.
///
/// Only the members needed for OKP (Ed25519), RSA and EC signature keys are
/// modeled; unknown members are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type: `OKP`, `RSA` or `EC`.
    pub kty: String,

    /// Key ID used to select the key named in a token header.
    #[serde(default)]
    pub kid: Option<String>,

    /// Algorithm the key is intended for, if the provider pins one.
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (`sig` or `enc`).
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Curve for OKP and EC keys.
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key, or EC x coordinate (base64url).
    #[serde(default)]
    pub x: Option<String>,

    /// EC y coordinate (base64url).
    #[serde(default)]
    pub y: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,
}

impl Jwk {
    fn is_signing_key(&self) -> bool {
        self.key_use.as_deref().map_or(true, |u| u == "sig")
    }
}

/// JWK set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

struct CachedJwks {
    keys: Vec<Jwk>,
    expires_at: Instant,
}

impl CachedJwks {
    /// Select by `kid`. Without a `kid` the set must hold exactly one key.
    fn select(&self, kid: Option<&str>) -> Option<&Jwk> {
        match kid {
            Some(kid) => self.keys.iter().find(|k| k.kid.as_deref() == Some(kid)),
            None => match self.keys.as_slice() {
                [only] => Some(only),
                _ => None,
            },
        }
    }
}

/// Thread-safe JWKS client with a TTL cache.
pub struct JwksClient {
    jwks_url: String,
    http_client: reqwest::Client,
    cache: Arc<RwLock<Option<CachedJwks>>>,
    cache_ttl: Duration,
}

impl JwksClient {
    /// Create a client for `jwks_url` using the default TTL.
    #[must_use]
    pub fn new(jwks_url: String, http_client: reqwest::Client) -> Self {
        Self::with_ttl(jwks_url, http_client, DEFAULT_CACHE_TTL)
    }

    /// Create a client with a custom cache TTL.
    #[must_use]
    pub fn with_ttl(jwks_url: String, http_client: reqwest::Client, cache_ttl: Duration) -> Self {
        Self {
            jwks_url,
            http_client,
            cache: Arc::new(RwLock::new(None)),
            cache_ttl,
        }
    }

    /// Get the signing key for `kid`, refreshing the cache if it is empty or
    /// expired.
    ///
    /// # Errors
    ///
    /// - `KeysUnavailable` if the JWKS cannot be fetched or parsed
    /// - `KeyNotFound` if no key matches
    #[instrument(skip(self))]
    pub async fn get_key(&self, kid: Option<&str>) -> Result<Jwk, VerificationError> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.expires_at > Instant::now() {
                    if let Some(key) = cached.select(kid) {
                        tracing::debug!(target: "pam_oidc.oidc.jwks", kid = ?kid, "JWKS cache hit");
                        return Ok(key.clone());
                    }
                    tracing::debug!(target: "pam_oidc.oidc.jwks", kid = ?kid, "Key not found in JWKS cache");
                    return Err(VerificationError::KeyNotFound);
                }
            }
        }

        self.refresh_cache().await?;

        let cache = self.cache.read().await;
        if let Some(key) = cache.as_ref().and_then(|cached| cached.select(kid)) {
            return Ok(key.clone());
        }

        tracing::warn!(target: "pam_oidc.oidc.jwks", kid = ?kid, "Key not found in JWKS after refresh");
        Err(VerificationError::KeyNotFound)
    }

    #[instrument(skip(self))]
    async fn refresh_cache(&self) -> Result<(), VerificationError> {
        tracing::debug!(target: "pam_oidc.oidc.jwks", url = %self.jwks_url, "Fetching JWKS");

        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "pam_oidc.oidc.jwks", error = %e, "Failed to fetch JWKS");
                VerificationError::KeysUnavailable("request failed".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "pam_oidc.oidc.jwks",
                status = %response.status(),
                "JWKS endpoint returned error"
            );
            return Err(VerificationError::KeysUnavailable(format!(
                "status {}",
                response.status().as_u16()
            )));
        }

        let jwks: JwksResponse = response.json().await.map_err(|e| {
            tracing::error!(target: "pam_oidc.oidc.jwks", error = %e, "Failed to parse JWKS response");
            VerificationError::KeysUnavailable("invalid key set".to_string())
        })?;

        let keys: Vec<Jwk> = jwks.keys.into_iter().filter(Jwk::is_signing_key).collect();

        tracing::info!(
            target: "pam_oidc.oidc.jwks",
            key_count = keys.len(),
            "JWKS cache refreshed"
        );

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys,
            expires_at: Instant::now() + self.cache_ttl,
        });

        Ok(())
    }

    /// Drop cached keys so the next lookup refetches.
    pub async fn clear_cache(&self) {
        let mut cache = self.cache.write().await;
        *cache = None;
    }
}
