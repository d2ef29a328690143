//! Builder patterns for test data construction
//!
//! Provides a fluent API for ID token claim sets.

use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Builder for ID token claims
///
/// # Example
/// ```rust,ignore
/// let claims = TestTokenBuilder::new("https://idp.example.com", "login")
///     .for_subject("jdoe")
///     .with_groups(&["eng", "ops"])
///     .with_acr("mfa")
///     .expires_in(3600)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    iss: String,
    aud: Value,
    sub: String,
    exp: i64,
    iat: i64,
    nbf: Option<i64>,
    acr: Option<String>,
    extra: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a builder for `issuer` and `audience`, valid for one hour.
    pub fn new(issuer: &str, audience: &str) -> Self {
        let now = Utc::now();
        Self {
            iss: issuer.to_string(),
            aud: json!(audience),
            sub: "test-subject".to_string(),
            exp: (now + Duration::seconds(3600)).timestamp(),
            iat: now.timestamp(),
            nbf: None,
            acr: None,
            extra: Map::new(),
        }
    }

    /// Set the subject
    pub fn for_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    /// Override the issuer
    pub fn with_issuer(mut self, issuer: &str) -> Self {
        self.iss = issuer.to_string();
        self
    }

    /// Set a single audience
    pub fn with_audience(mut self, audience: &str) -> Self {
        self.aud = json!(audience);
        self
    }

    /// Set several audiences (serialized as an array)
    pub fn with_audiences(mut self, audiences: &[&str]) -> Self {
        self.aud = json!(audiences);
        self
    }

    /// Set the `acr` claim
    pub fn with_acr(mut self, acr: &str) -> Self {
        self.acr = Some(acr.to_string());
        self
    }

    /// Set the `groups` claim to a list of strings
    pub fn with_groups(self, groups: &[&str]) -> Self {
        self.with_claim("groups", json!(groups))
    }

    /// Set any additional claim
    pub fn with_claim(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(mut self, seconds: i64) -> Self {
        self.nbf = Some((Utc::now() + Duration::seconds(seconds)).timestamp());
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        let mut claims = self.extra;
        claims.insert("iss".to_string(), json!(self.iss));
        claims.insert("aud".to_string(), self.aud);
        claims.insert("sub".to_string(), json!(self.sub));
        claims.insert("exp".to_string(), json!(self.exp));
        claims.insert("iat".to_string(), json!(self.iat));
        if let Some(nbf) = self.nbf {
            claims.insert("nbf".to_string(), json!(nbf));
        }
        if let Some(acr) = self.acr {
            claims.insert("acr".to_string(), json!(acr));
        }
        Value::Object(claims)
    }
}
