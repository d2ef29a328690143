//! Token-to-decision orchestration.

use crate::oidc::TokenVerifier;
use crate::policy::{self, Decision, DenyReason, PolicyConfig};
use common::secret::{ExposeSecret, SecretString};
use std::sync::Arc;
use tracing::instrument;

/// Binds a verifier, the expected audience and a policy.
///
/// One `Authenticator` can serve any number of attempts, concurrently if
/// the verifier allows; it keeps no state between them.
pub struct Authenticator {
    verifier: Arc<dyn TokenVerifier>,
    audience: String,
    policy: PolicyConfig,
}

impl Authenticator {
    #[must_use]
    pub fn new(verifier: Arc<dyn TokenVerifier>, audience: String, policy: PolicyConfig) -> Self {
        Self {
            verifier,
            audience,
            policy,
        }
    }

    /// Verify `raw_token` and decide whether it authorizes `asserted_user`.
    ///
    /// Verification failures deny with [`DenyReason::TokenInvalid`] before
    /// any policy gate runs.
    #[instrument(skip_all)]
    pub async fn authenticate(&self, asserted_user: &str, raw_token: &SecretString) -> Decision {
        let claims = match self
            .verifier
            .verify(&self.audience, raw_token.expose_secret())
            .await
        {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(target: "pam_oidc.engine", error = %e, "Token verification failed");
                return Decision::Deny(DenyReason::TokenInvalid(e));
            }
        };

        policy::evaluate(&self.policy, &claims, asserted_user)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::claims::{ClaimValue, Claims};
    use crate::oidc::VerificationError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Verifier double returning a fixed result and recording calls.
    struct StaticVerifier {
        result: Result<Claims, VerificationError>,
        calls: AtomicUsize,
    }

    impl StaticVerifier {
        fn accepting(claims: Claims) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(claims),
                calls: AtomicUsize::new(0),
            })
        }

        fn rejecting(error: VerificationError) -> Arc<Self> {
            Arc::new(Self {
                result: Err(error),
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TokenVerifier for StaticVerifier {
        async fn verify(&self, audience: &str, _raw_token: &str) -> Result<Claims, VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(audience, "login");
            self.result.clone()
        }
    }

    fn claims() -> Claims {
        let mut c = Claims {
            subject: "jdoe".to_string(),
            issuer: "https://idp.example.com".to_string(),
            audience: vec!["login".to_string()],
            acr: "mfa".to_string(),
            ..Claims::default()
        };
        c.extra
            .insert("groups".to_string(), ClaimValue::strings(["eng"]));
        c
    }

    fn token() -> SecretString {
        SecretString::from("header.payload.signature")
    }

    #[tokio::test]
    async fn test_accepts_verified_matching_user() {
        let verifier = StaticVerifier::accepting(claims());
        let auth = Authenticator::new(verifier.clone(), "login".to_string(), PolicyConfig::default());

        assert_eq!(auth.authenticate("jdoe", &token()).await, Decision::Accept);
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_verification_failure_denies_before_policy() {
        let verifier = StaticVerifier::rejecting(VerificationError::Expired);
        let policy = PolicyConfig {
            user_template: "{{broken}}".to_string(),
            ..PolicyConfig::default()
        };
        let auth = Authenticator::new(verifier, "login".to_string(), policy);

        assert_eq!(
            auth.authenticate("jdoe", &token()).await,
            Decision::Deny(DenyReason::TokenInvalid(VerificationError::Expired))
        );
    }

    #[tokio::test]
    async fn test_policy_applied_after_verification() {
        let policy = PolicyConfig {
            authorized_groups: vec!["admins".to_string()],
            ..PolicyConfig::default()
        };
        let auth = Authenticator::new(StaticVerifier::accepting(claims()), "login".to_string(), policy);

        assert!(matches!(
            auth.authenticate("jdoe", &token()).await,
            Decision::Deny(DenyReason::GroupMembershipDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_attempts_share_authenticator() {
        let auth = Arc::new(Authenticator::new(
            StaticVerifier::accepting(claims()),
            "login".to_string(),
            PolicyConfig::default(),
        ));

        let handles: Vec<_> = ["jdoe", "other", "jdoe"]
            .into_iter()
            .map(|user| {
                let auth = Arc::clone(&auth);
                tokio::spawn(async move { auth.authenticate(user, &token()).await })
            })
            .collect();

        let mut decisions = Vec::new();
        for handle in handles {
            decisions.push(handle.await.unwrap());
        }

        assert_eq!(
            decisions,
            vec![
                Decision::Accept,
                Decision::Deny(DenyReason::IdentityMismatch),
                Decision::Accept
            ]
        );
    }
}
