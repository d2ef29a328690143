//! Claims authorization policy engine.
//!
//! [`evaluate`] runs the configured gates against one set of verified claims
//! and one asserted username, in a fixed order:
//!
//! 1. identity: the rendered user template must equal the asserted user
//! 2. group membership, if `authorized_groups` is non-empty
//! 3. assurance level, if `require_acr` is non-empty
//!
//! The first failing gate decides. The engine holds no state between calls
//! and never touches the network.

pub mod acr;
pub mod groups;

use crate::claims::Claims;
use crate::oidc::VerificationError;
use crate::template::{self, TemplateError, DEFAULT_USER_TEMPLATE};
use groups::{MissingClaimError, DEFAULT_GROUPS_CLAIM_KEY};
use thiserror::Error;
use tracing::debug;

/// Policy applied to one authentication attempt.
///
/// Empty strings mean "use the default" (`user_template`,
/// `groups_claim_key`) or "not enforced" (`require_acr`). An empty
/// `authorized_groups` disables the group check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    pub user_template: String,
    pub groups_claim_key: String,
    pub authorized_groups: Vec<String>,
    pub require_acr: String,
}

/// Outcome of an authentication attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Deny(DenyReason),
}

impl Decision {
    #[must_use]
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Why an attempt was denied.
///
/// Display output is meant for operator logs and never carries claim values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DenyReason {
    #[error("verifying token: {0}")]
    TokenInvalid(#[from] VerificationError),

    #[error(transparent)]
    TemplateInvalid(#[from] TemplateError),

    #[error("token not valid for user")]
    IdentityMismatch,

    #[error("group membership check failed: {0}")]
    GroupMembershipDenied(GroupDenial),

    #[error("required acr not satisfied")]
    AssuranceLevelDenied,
}

/// Detail for [`DenyReason::GroupMembershipDenied`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupDenial {
    #[error(transparent)]
    MissingClaim(#[from] MissingClaimError),

    #[error("user not in any authorized group")]
    NotAMember,
}

/// Evaluate `policy` against verified `claims` for `asserted_user`.
#[must_use]
pub fn evaluate(policy: &PolicyConfig, claims: &Claims, asserted_user: &str) -> Decision {
    match check(policy, claims, asserted_user) {
        Ok(()) => Decision::Accept,
        Err(reason) => {
            debug!(target: "pam_oidc.engine", reason = %reason, "Policy denied attempt");
            Decision::Deny(reason)
        }
    }
}

fn check(policy: &PolicyConfig, claims: &Claims, asserted_user: &str) -> Result<(), DenyReason> {
    let user_template = if policy.user_template.is_empty() {
        DEFAULT_USER_TEMPLATE
    } else {
        &policy.user_template
    };
    let expected_user = template::render(user_template, claims)?;
    if expected_user != asserted_user {
        return Err(DenyReason::IdentityMismatch);
    }

    if !policy.authorized_groups.is_empty() {
        let groups_claim_key = if policy.groups_claim_key.is_empty() {
            DEFAULT_GROUPS_CLAIM_KEY
        } else {
            &policy.groups_claim_key
        };
        let authorized =
            groups::is_authorized(&policy.authorized_groups, &claims.extra, groups_claim_key)
                .map_err(|e| DenyReason::GroupMembershipDenied(e.into()))?;
        if !authorized {
            return Err(DenyReason::GroupMembershipDenied(GroupDenial::NotAMember));
        }
    }

    if !acr::check_acr(&policy.require_acr, &claims.acr) {
        return Err(DenyReason::AssuranceLevelDenied);
    }

    Ok(())
}
