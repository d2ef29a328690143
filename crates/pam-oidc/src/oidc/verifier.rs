//! ID token verification against an issuer's JWKS.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - HMAC algorithms are rejected; the header algorithm must agree with the
//!   key type and with the JWK's pinned `alg`, if any
//! - `exp`, `nbf`, `iss` and `aud` are enforced with clock skew leeway
//! - `iat` may not be further in the future than the clock skew

use super::jwks::{Jwk, JwksClient};
use super::{TokenVerifier, VerificationError};
use crate::claims::{ClaimValue, Claims};
use async_trait::async_trait;
use common::jwt::{
    decode_b64url, peek_header, validate_iat, JwtValidationError, DEFAULT_CLOCK_SKEW,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// Registered claims consumed during verification and not exposed in
/// [`Claims::extra`].
const CONSUMED_CLAIMS: &[&str] = &["exp", "nbf"];

/// `aud` may be a single string or an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Audience {
    One(String),
    Many(Vec<String>),
}

impl From<Audience> for Vec<String> {
    fn from(audience: Audience) -> Self {
        match audience {
            Audience::One(aud) => vec![aud],
            Audience::Many(auds) => auds,
        }
    }
}

/// Payload of an OIDC ID token.
#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    iss: String,
    sub: String,
    aud: Audience,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    acr: Option<String>,
    #[serde(default)]
    amr: Option<serde_json::Value>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    nonce: Option<String>,
    #[serde(default)]
    auth_time: Option<i64>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl From<IdTokenClaims> for Claims {
    fn from(token: IdTokenClaims) -> Self {
        let amr = match token.amr {
            Some(serde_json::Value::Array(methods)) => methods
                .into_iter()
                .filter_map(|m| match m {
                    serde_json::Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };

        let extra = token
            .extra
            .into_iter()
            .filter(|(key, _)| !CONSUMED_CLAIMS.contains(&key.as_str()))
            .map(|(key, value)| (key, ClaimValue::from(value)))
            .collect();

        Claims {
            subject: token.sub,
            issuer: token.iss,
            audience: token.aud.into(),
            acr: token.acr.unwrap_or_default(),
            amr,
            authorized_party: token.azp.unwrap_or_default(),
            nonce: token.nonce.unwrap_or_default(),
            auth_time: token.auth_time,
            extra,
        }
    }
}

/// Verifies ID tokens from a single issuer.
pub struct OidcVerifier {
    issuer: String,
    jwks_client: Arc<JwksClient>,
    clock_skew: Duration,
    supported_algorithms: Option<Vec<Algorithm>>,
}

impl OidcVerifier {
    /// Create a verifier for `issuer` using keys from `jwks_client`.
    #[must_use]
    pub fn new(issuer: String, jwks_client: Arc<JwksClient>) -> Self {
        Self {
            issuer,
            jwks_client,
            clock_skew: DEFAULT_CLOCK_SKEW,
            supported_algorithms: None,
        }
    }

    /// Override the clock skew leeway.
    #[must_use]
    pub fn with_clock_skew(mut self, clock_skew: Duration) -> Self {
        self.clock_skew = clock_skew;
        self
    }

    /// Restrict accepted algorithms to those the issuer advertises.
    #[must_use]
    pub fn with_supported_algorithms(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.supported_algorithms = Some(algorithms);
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    fn algorithm_for(&self, alg: &str) -> Result<Algorithm, VerificationError> {
        let algorithm = Algorithm::from_str(alg).map_err(|_| {
            tracing::debug!(target: "pam_oidc.oidc.verifier", alg = %alg, "Unknown token algorithm");
            VerificationError::UnsupportedAlgorithm(alg.to_string())
        })?;

        if matches!(
            algorithm,
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512
        ) {
            tracing::warn!(target: "pam_oidc.oidc.verifier", alg = %alg, "Symmetric token algorithm rejected");
            return Err(VerificationError::UnsupportedAlgorithm(alg.to_string()));
        }

        if let Some(supported) = &self.supported_algorithms {
            if !supported.contains(&algorithm) {
                tracing::debug!(target: "pam_oidc.oidc.verifier", alg = %alg, "Algorithm not advertised by issuer");
                return Err(VerificationError::UnsupportedAlgorithm(alg.to_string()));
            }
        }

        Ok(algorithm)
    }
}

#[async_trait]
impl TokenVerifier for OidcVerifier {
    #[instrument(skip_all)]
    async fn verify(&self, audience: &str, raw_token: &str) -> Result<Claims, VerificationError> {
        // 1. Size check and header inspection
        let header = peek_header(raw_token)?;
        let algorithm = self.algorithm_for(&header.alg)?;

        // 2. Key lookup
        let jwk = self.jwks_client.get_key(header.kid.as_deref()).await?;

        // 3. Signature, exp, nbf, iss, aud
        let claims = verify_token(raw_token, &jwk, algorithm, &self.issuer, audience, self.clock_skew)?;

        // 4. iat with clock skew tolerance
        if let Some(iat) = claims.iat {
            if let Err(e) = validate_iat(iat, self.clock_skew) {
                tracing::debug!(target: "pam_oidc.oidc.verifier", error = ?e, "Token iat validation failed");
                return Err(e.into());
            }
        }

        tracing::debug!(target: "pam_oidc.oidc.verifier", "Token verified successfully");
        Ok(claims.into())
    }
}

/// Build a decoding key from `jwk`, checking it can verify `algorithm`.
fn decoding_key(jwk: &Jwk, algorithm: Algorithm) -> Result<DecodingKey, VerificationError> {
    if let Some(alg) = &jwk.alg {
        if Algorithm::from_str(alg).ok() != Some(algorithm) {
            tracing::warn!(target: "pam_oidc.oidc.verifier", jwk_alg = %alg, "Token algorithm does not match JWK");
            return Err(VerificationError::InvalidKey);
        }
    }

    let key = match (jwk.kty.as_str(), algorithm) {
        ("OKP", Algorithm::EdDSA) if jwk.crv.as_deref() == Some("Ed25519") => {
            let x = jwk.x.as_deref().ok_or(VerificationError::InvalidKey)?;
            let public_key = decode_b64url(x).map_err(|e| {
                tracing::error!(target: "pam_oidc.oidc.verifier", error = %e, "Invalid public key encoding");
                VerificationError::InvalidKey
            })?;
            Ok(DecodingKey::from_ed_der(&public_key))
        }
        (
            "RSA",
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512,
        ) => match (jwk.n.as_deref(), jwk.e.as_deref()) {
            (Some(n), Some(e)) => DecodingKey::from_rsa_components(n, e),
            _ => return Err(VerificationError::InvalidKey),
        },
        ("EC", Algorithm::ES256) if jwk.crv.as_deref() == Some("P-256") => ec_key(jwk),
        ("EC", Algorithm::ES384) if jwk.crv.as_deref() == Some("P-384") => ec_key(jwk),
        (kty, _) => {
            tracing::warn!(target: "pam_oidc.oidc.verifier", kty = %kty, "JWK type does not match token algorithm");
            return Err(VerificationError::InvalidKey);
        }
    };

    key.map_err(|e| {
        tracing::error!(target: "pam_oidc.oidc.verifier", error = %e, "Unusable JWK");
        VerificationError::InvalidKey
    })
}

fn ec_key(jwk: &Jwk) -> jsonwebtoken::errors::Result<DecodingKey> {
    match (jwk.x.as_deref(), jwk.y.as_deref()) {
        (Some(x), Some(y)) => DecodingKey::from_ec_components(x, y),
        _ => Err(ErrorKind::InvalidEcdsaKey.into()),
    }
}

fn verify_token(
    token: &str,
    jwk: &Jwk,
    algorithm: Algorithm,
    issuer: &str,
    audience: &str,
    clock_skew: Duration,
) -> Result<IdTokenClaims, VerificationError> {
    let key = decoding_key(jwk, algorithm)?;

    let mut validation = Validation::new(algorithm);
    validation.leeway = clock_skew.as_secs();
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.set_issuer(&[issuer]);
    validation.set_audience(&[audience]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

    decode::<IdTokenClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::debug!(target: "pam_oidc.oidc.verifier", error = %e, "Token verification failed");
            match e.kind() {
                ErrorKind::ExpiredSignature => VerificationError::Expired,
                ErrorKind::ImmatureSignature => VerificationError::NotYetValid,
                ErrorKind::InvalidIssuer => VerificationError::InvalidIssuer,
                ErrorKind::InvalidAudience => VerificationError::InvalidAudience,
                ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => {
                    VerificationError::UnsupportedAlgorithm(format!("{algorithm:?}"))
                }
                ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat => VerificationError::InvalidKey,
                ErrorKind::Base64(_) | ErrorKind::Utf8(_) | ErrorKind::InvalidToken => {
                    VerificationError::Rejected(JwtValidationError::MalformedToken)
                }
                _ => VerificationError::InvalidClaims,
            }
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn okp_jwk(alg: Option<&str>) -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            kid: Some("k1".to_string()),
            alg: alg.map(ToString::to_string),
            key_use: Some("sig".to_string()),
            crv: Some("Ed25519".to_string()),
            x: Some("dGVzdC1wdWJsaWMta2V5LWRhdGE".to_string()),
            y: None,
            n: None,
            e: None,
        }
    }

    fn verifier() -> OidcVerifier {
        let jwks = JwksClient::new("http://127.0.0.1:9/keys".to_string(), reqwest::Client::new());
        OidcVerifier::new("https://idp.example.com".to_string(), Arc::new(jwks))
    }

    #[test]
    fn test_symmetric_algorithms_rejected() {
        for alg in ["HS256", "HS384", "HS512"] {
            assert_eq!(
                verifier().algorithm_for(alg).unwrap_err(),
                VerificationError::UnsupportedAlgorithm(alg.to_string())
            );
        }
    }

    #[test]
    fn test_unknown_algorithm_rejected() {
        assert!(verifier().algorithm_for("none").is_err());
        assert!(verifier().algorithm_for("ES512").is_err());
    }

    #[test]
    fn test_advertised_algorithms_restrict() {
        let v = verifier().with_supported_algorithms(vec![Algorithm::RS256]);
        assert_eq!(v.algorithm_for("RS256").unwrap(), Algorithm::RS256);
        assert!(v.algorithm_for("EdDSA").is_err());
    }

    #[test]
    fn test_decoding_key_rejects_kty_mismatch() {
        let mut jwk = okp_jwk(None);
        jwk.kty = "RSA".to_string();
        assert_eq!(
            decoding_key(&jwk, Algorithm::EdDSA).err(),
            Some(VerificationError::InvalidKey)
        );
    }

    #[test]
    fn test_decoding_key_rejects_pinned_alg_mismatch() {
        assert_eq!(
            decoding_key(&okp_jwk(Some("RS256")), Algorithm::EdDSA).err(),
            Some(VerificationError::InvalidKey)
        );
    }

    #[test]
    fn test_decoding_key_rejects_missing_x() {
        let mut jwk = okp_jwk(Some("EdDSA"));
        jwk.x = None;
        assert!(decoding_key(&jwk, Algorithm::EdDSA).is_err());
    }

    #[test]
    fn test_decoding_key_accepts_okp() {
        assert!(decoding_key(&okp_jwk(Some("EdDSA")), Algorithm::EdDSA).is_ok());
    }

    #[test]
    fn test_decoding_key_requires_rsa_components() {
        let jwk = Jwk {
            kty: "RSA".to_string(),
            kid: None,
            alg: None,
            key_use: None,
            crv: None,
            x: None,
            y: None,
            n: Some("AQAB".to_string()),
            e: None,
        };
        assert!(decoding_key(&jwk, Algorithm::RS256).is_err());
    }

    #[test]
    fn test_id_token_claims_mapping() {
        let token: IdTokenClaims = serde_json::from_value(json!({
            "iss": "https://idp.example.com",
            "sub": "jdoe",
            "aud": "login",
            "exp": 9_999_999_999_i64,
            "iat": 1_700_000_000,
            "nbf": 1_700_000_000,
            "auth_time": 1_700_000_100,
            "azp": "pam-client",
            "nonce": "n-0S6_WzA2Mj",
            "acr": "mfa",
            "amr": ["pwd", 7, "otp"],
            "groups": ["eng", "ops"],
            "email": "jdoe@example.com"
        }))
        .unwrap();

        let claims = Claims::from(token);

        assert_eq!(claims.subject, "jdoe");
        assert_eq!(claims.issuer, "https://idp.example.com");
        assert_eq!(claims.audience, vec!["login".to_string()]);
        assert_eq!(claims.acr, "mfa");
        assert_eq!(claims.amr, vec!["pwd".to_string(), "otp".to_string()]);
        assert_eq!(claims.authorized_party, "pam-client");
        assert_eq!(claims.nonce, "n-0S6_WzA2Mj");
        assert_eq!(claims.auth_time, Some(1_700_000_100));
        assert_eq!(
            claims.extra.get("groups"),
            Some(&ClaimValue::strings(["eng", "ops"]))
        );
        assert!(claims.extra.contains_key("email"));
        for consumed in [
            "iss", "sub", "aud", "exp", "iat", "acr", "amr", "nbf", "auth_time", "azp", "nonce",
        ] {
            assert!(!claims.extra.contains_key(consumed), "{consumed} leaked into extra");
        }
    }

    #[test]
    fn test_id_token_audience_array() {
        let token: IdTokenClaims = serde_json::from_value(json!({
            "iss": "i", "sub": "s", "aud": ["a", "b"], "exp": 1
        }))
        .unwrap();
        assert_eq!(Claims::from(token).audience, vec!["a", "b"]);
    }

    #[test]
    fn test_id_token_without_acr() {
        let token: IdTokenClaims = serde_json::from_value(json!({
            "iss": "i", "sub": "s", "aud": "a", "exp": 1
        }))
        .unwrap();
        let claims = Claims::from(token);
        assert_eq!(claims.acr, "");
        assert!(claims.amr.is_empty());
        assert_eq!(claims.authorized_party, "");
        assert!(claims.auth_time.is_none());
    }
}
