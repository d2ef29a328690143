//! Authentication context class (`acr`) check.

/// Returns true if `actual` satisfies `required`.
///
/// An empty `required` is not enforced. Otherwise the comparison is exact:
/// no case folding, no trimming, no ordering between levels.
#[must_use]
pub fn check_acr(required: &str, actual: &str) -> bool {
    required.is_empty() || required == actual
}
