//! Group membership evaluation.
//!
//! Identity providers disagree on the shape of the groups claim: most send a
//! list of strings, some send a single string, and a few mix in values of
//! other types. Extraction tolerates all of these without panicking.

use crate::claims::{ClaimValue, Scalar};
use std::collections::BTreeMap;
use thiserror::Error;

/// Claim key consulted when no groups claim key is configured.
pub const DEFAULT_GROUPS_CLAIM_KEY: &str = "groups";

/// The configured groups claim is absent, or present with a shape that
/// cannot hold group names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("groups claim {key:?} missing or not a list")]
pub struct MissingClaimError {
    pub key: String,
}

/// Extract group names from `extra[groups_claim_key]`.
///
/// String elements of a sequence are kept and anything else is dropped. A
/// single string counts as a one-element sequence. Other scalars yield no
/// groups.
///
/// # Errors
///
/// Returns [`MissingClaimError`] if the key is absent or holds an
/// unrecognized value.
pub fn extract_groups<'a>(
    extra: &'a BTreeMap<String, ClaimValue>,
    groups_claim_key: &str,
) -> Result<Vec<&'a str>, MissingClaimError> {
    let missing = || MissingClaimError {
        key: groups_claim_key.to_string(),
    };

    match extra.get(groups_claim_key).ok_or_else(missing)? {
        ClaimValue::Sequence(items) => Ok(items
            .iter()
            .filter_map(|item| match item {
                ClaimValue::Scalar(Scalar::String(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect()),
        ClaimValue::Scalar(Scalar::String(s)) => Ok(vec![s.as_str()]),
        ClaimValue::Scalar(_) => Ok(Vec::new()),
        ClaimValue::Unrecognized => Err(missing()),
    }
}

/// Report whether any group in `extra[groups_claim_key]` is one of
/// `authorized_groups`.
///
/// # Errors
///
/// Returns [`MissingClaimError`] under the same conditions as
/// [`extract_groups`].
pub fn is_authorized(
    authorized_groups: &[String],
    extra: &BTreeMap<String, ClaimValue>,
    groups_claim_key: &str,
) -> Result<bool, MissingClaimError> {
    let groups = extract_groups(extra, groups_claim_key)?;
    Ok(groups
        .iter()
        .any(|group| authorized_groups.iter().any(|allowed| allowed == group)))
}
