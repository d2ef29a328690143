//! JWT utilities shared across the workspace.
//!
//! This module provides the pre-verification checks that every token goes
//! through before any key lookup or signature work:
//! - Size limits for DoS prevention
//! - Header inspection (`kid`, `alg`) without verifying the signature
//! - Clock skew constants and `iat` validation
//! - base64url decoding of JWK key material
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Header values are only hints for key selection; the token MUST still be
//!   verified against a trusted key afterwards
//! - Error messages are generic and never echo token contents
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{peek_header, validate_iat, DEFAULT_CLOCK_SKEW};
//!
//! let header = peek_header(token)?;
//! let key = jwks.get_key(header.kid.as_deref()).await?;
//! // ... verify signature ...
//! validate_iat(claims.iat, DEFAULT_CLOCK_SKEW)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (64KB).
///
/// Identity tokens from most providers are 800-2000 bytes, but users in
/// hundreds of groups routinely carry tokens of 10-30KB. Anything over 64KB
/// is rejected before any base64 decoding or cryptographic work.
pub const MAX_JWT_SIZE_BYTES: usize = 64 * 1024; // 64KB

/// Default JWT clock skew tolerance (5 minutes per NIST SP 800-63B).
///
/// Applied as leeway to `exp`/`nbf` and as the upper bound for how far in
/// the future `iat` may be.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during pre-verification JWT checks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds maximum size")]
    TokenTooLarge,

    /// Token format is invalid (not a valid compact JWS).
    #[error("token is malformed")]
    MalformedToken,

    /// Token `iat` claim is too far in the future.
    #[error("token issued-at is in the future")]
    IatTooFarInFuture,
}

// =============================================================================
// Header
// =============================================================================

/// The subset of a JOSE header needed to select a verification key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signing algorithm name as it appears in the header (e.g. `RS256`).
    pub alg: String,

    /// Key ID, if the issuer sets one. Empty strings are normalized to `None`.
    #[serde(default)]
    pub kid: Option<String>,
}

/// Read the JOSE header of a compact JWT without verifying the signature.
///
/// # Security
///
/// - Token size is checked BEFORE any parsing (denial-of-service prevention)
/// - This function does NOT validate the token signature
/// - `kid` and `alg` must only be used to look up a key in a trusted JWKS
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong number of segments, bad base64, invalid JSON,
///   or a header without a string `alg`
pub fn peek_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let mut header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    if header.kid.as_deref().is_some_and(str::is_empty) {
        header.kid = None;
    }

    Ok(header)
}

// =============================================================================
// Functions
// =============================================================================

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if `iat` is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let clock_skew_secs = i64::try_from(clock_skew.as_secs()).unwrap_or(i64::MAX);
    let max_iat = now.saturating_add(clock_skew_secs);

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

/// Decode a base64url (no padding) JWK member such as the OKP `x` field.
///
/// # Errors
///
/// Returns `base64::DecodeError` if the content is not valid base64url.
pub fn decode_b64url(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(value)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_wrap)]
mod tests {
    use super::*;

    fn token_with_header(header: &str) -> String {
        format!("{}.payload.signature", URL_SAFE_NO_PAD.encode(header))
    }

    #[test]
    fn test_max_jwt_size_is_64kb() {
        assert_eq!(MAX_JWT_SIZE_BYTES, 65536);
    }

    #[test]
    fn test_default_clock_skew_is_5_minutes() {
        assert_eq!(DEFAULT_CLOCK_SKEW, Duration::from_secs(300));
    }

    // -------------------------------------------------------------------------
    // peek_header Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_peek_header_with_kid() {
        let token = token_with_header(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, "RS256");
        assert_eq!(header.kid.as_deref(), Some("key-01"));
    }

    #[test]
    fn test_peek_header_without_kid() {
        let token = token_with_header(r#"{"alg":"EdDSA"}"#);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, "EdDSA");
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_peek_header_empty_kid_is_none() {
        let token = token_with_header(r#"{"alg":"EdDSA","kid":""}"#);

        let header = peek_header(&token).unwrap();
        assert!(header.kid.is_none());
    }

    #[test]
    fn test_peek_header_missing_alg() {
        let token = token_with_header(r#"{"typ":"JWT","kid":"k"}"#);
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_wrong_segment_count() {
        assert_eq!(peek_header(""), Err(JwtValidationError::MalformedToken));
        assert_eq!(peek_header("single"), Err(JwtValidationError::MalformedToken));
        assert_eq!(peek_header("only.two"), Err(JwtValidationError::MalformedToken));
        assert_eq!(
            peek_header("a.b.c.d"),
            Err(JwtValidationError::MalformedToken)
        );
    }

    #[test]
    fn test_peek_header_invalid_base64() {
        let result = peek_header("!!!invalid!!!.payload.signature");
        assert_eq!(result, Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_invalid_json() {
        let token = token_with_header("not-json");
        assert_eq!(peek_header(&token), Err(JwtValidationError::MalformedToken));
    }

    #[test]
    fn test_peek_header_oversized_token() {
        let oversized = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            peek_header(&oversized),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_peek_header_at_size_limit() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"EdDSA","kid":"key"}"#);
        let remaining = MAX_JWT_SIZE_BYTES - header_b64.len() - 2;
        let payload_len = remaining / 2;
        let token = format!(
            "{}.{}.{}",
            header_b64,
            "a".repeat(payload_len),
            "b".repeat(remaining - payload_len)
        );
        assert_eq!(token.len(), MAX_JWT_SIZE_BYTES);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("key"));
    }

    #[test]
    fn test_peek_header_group_heavy_token() {
        // ~1000 group names puts a token well past 16KB
        let groups: Vec<String> = (0..1000).map(|i| format!("\"team-{i:04}-members\"")).collect();
        let payload = URL_SAFE_NO_PAD.encode(format!("{{\"groups\":[{}]}}", groups.join(",")));
        let token = format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256","kid":"key"}"#),
            payload
        );
        assert!(token.len() > 16 * 1024);

        let header = peek_header(&token).unwrap();
        assert_eq!(header.alg, "RS256");
    }

    // -------------------------------------------------------------------------
    // validate_iat Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_iat_current_time() {
        let now = chrono::Utc::now().timestamp();
        assert!(validate_iat(now, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_past_time() {
        let past = chrono::Utc::now().timestamp() - 3600;
        assert!(validate_iat(past, DEFAULT_CLOCK_SKEW).is_ok());
    }

    #[test]
    fn test_validate_iat_far_future() {
        let far_future = chrono::Utc::now().timestamp() + 86400;
        assert_eq!(
            validate_iat(far_future, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_validate_iat_at_boundary_exact() {
        let now = 1_700_000_000_i64;

        // iat == now + skew is the last accepted value
        assert!(validate_iat_at(now + 300, DEFAULT_CLOCK_SKEW, now).is_ok());

        // iat == now + skew + 1 is the first rejected value
        assert_eq!(
            validate_iat_at(now + 301, DEFAULT_CLOCK_SKEW, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    // -------------------------------------------------------------------------
    // Key Decoding Tests
    // -------------------------------------------------------------------------

    #[test]
    fn test_decode_b64url_ed25519_key() {
        let x = "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo";
        assert_eq!(decode_b64url(x).unwrap().len(), 32);
    }

    #[test]
    fn test_decode_b64url_invalid() {
        assert!(decode_b64url("not-valid-base64url!!!").is_err());
    }
}
