//! Verified identity token claims.
//!
//! `Claims` is the read-only result of token verification. Standard OIDC
//! claims are promoted to named fields; everything else lands in `extra` as a
//! [`ClaimValue`], whose shape is only known at runtime.
//!
//! The `subject` and the contents of `extra` are redacted in Debug output.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Claims extracted from a verified identity token.
#[derive(Clone, Default, PartialEq)]
pub struct Claims {
    /// Stable identifier of the authenticated principal - redacted in Debug output.
    pub subject: String,

    /// Verified issuer (`iss`).
    pub issuer: String,

    /// Audiences (`aud`), normalized to a sequence.
    pub audience: Vec<String>,

    /// Authentication context class reference. Empty when not asserted.
    pub acr: String,

    /// Authentication methods references (`amr`). Empty when absent.
    pub amr: Vec<String>,

    /// Authorized party (`azp`). Empty when absent.
    pub authorized_party: String,

    /// Nonce bound to the authentication request. Empty when absent.
    pub nonce: String,

    /// Time of the end-user authentication (`auth_time`), Unix seconds.
    pub auth_time: Option<i64>,

    /// Every claim not promoted to a named field - values redacted in Debug output.
    pub extra: BTreeMap<String, ClaimValue>,
}

impl fmt::Debug for Claims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Claims")
            .field("subject", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("acr", &self.acr)
            .field("amr", &self.amr)
            .field("authorized_party", &self.authorized_party)
            .field("auth_time", &self.auth_time)
            .field("extra_keys", &self.extra.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A single scalar claim value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    Null,
}

impl Scalar {
    /// Returns the string content if this is a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }
}

/// A claim value of runtime-determined shape.
///
/// Claims from identity providers are untyped JSON; the same claim name can
/// carry a string for one provider and a list for another. Consumers must
/// match on the variant rather than assume a shape.
#[derive(Debug, Clone, PartialEq)]
pub enum ClaimValue {
    Scalar(Scalar),
    Sequence(Vec<ClaimValue>),
    /// Objects and anything else without a defined shape.
    Unrecognized,
}

impl ClaimValue {
    /// Convenience constructor for a string scalar.
    pub fn string(value: impl Into<String>) -> Self {
        ClaimValue::Scalar(Scalar::String(value.into()))
    }

    /// Convenience constructor for a sequence of string scalars.
    pub fn strings<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ClaimValue::Sequence(values.into_iter().map(ClaimValue::string).collect())
    }
}

impl From<Value> for ClaimValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => ClaimValue::Scalar(Scalar::String(s)),
            Value::Number(n) => ClaimValue::Scalar(Scalar::Number(n)),
            Value::Bool(b) => ClaimValue::Scalar(Scalar::Bool(b)),
            Value::Null => ClaimValue::Scalar(Scalar::Null),
            Value::Array(items) => {
                ClaimValue::Sequence(items.into_iter().map(ClaimValue::from).collect())
            }
            Value::Object(_) => ClaimValue::Unrecognized,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_debug_redacts_subject_and_extra_values() {
        let mut extra = BTreeMap::new();
        extra.insert("email".to_string(), ClaimValue::string("jdoe@example.com"));

        let claims = Claims {
            subject: "secret-subject".to_string(),
            issuer: "https://issuer.example.com".to_string(),
            audience: vec!["aud".to_string()],
            extra,
            ..Claims::default()
        };

        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains("secret-subject"));
        assert!(!debug_str.contains("jdoe@example.com"));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("email"), "extra keys stay visible");
    }

    #[test]
    fn test_claim_value_from_json_scalars() {
        assert_eq!(ClaimValue::from(json!("eng")), ClaimValue::string("eng"));
        assert_eq!(
            ClaimValue::from(json!(true)),
            ClaimValue::Scalar(Scalar::Bool(true))
        );
        assert_eq!(
            ClaimValue::from(json!(null)),
            ClaimValue::Scalar(Scalar::Null)
        );
        assert!(matches!(
            ClaimValue::from(json!(42)),
            ClaimValue::Scalar(Scalar::Number(_))
        ));
    }

    #[test]
    fn test_claim_value_from_json_mixed_array() {
        let value = ClaimValue::from(json!(["eng", 7, {"nested": true}, ["x"]]));

        let ClaimValue::Sequence(items) = value else {
            panic!("expected sequence");
        };
        assert_eq!(items.len(), 4);
        assert_eq!(items.first(), Some(&ClaimValue::string("eng")));
        assert_eq!(items.get(2), Some(&ClaimValue::Unrecognized));
        assert_eq!(items.get(3), Some(&ClaimValue::strings(["x"])));
    }

    #[test]
    fn test_claim_value_from_json_object_is_unrecognized() {
        assert_eq!(
            ClaimValue::from(json!({"a": 1})),
            ClaimValue::Unrecognized
        );
    }

    #[test]
    fn test_scalar_as_str() {
        assert_eq!(Scalar::String("a".to_string()).as_str(), Some("a"));
        assert_eq!(Scalar::Bool(false).as_str(), None);
    }
}
