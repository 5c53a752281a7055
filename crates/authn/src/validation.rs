//! JWT algorithm validation.
//!
//! Session tokens are signed and verified with one server-held HMAC secret,
//! so exactly one algorithm is ever legitimate. The header's `alg` is checked
//! against these lists before any signature work happens.

use crate::error::AuthError;

/// Forbidden JWT algorithms that are never accepted.
///
/// `none` carries no signature at all and would let any payload through.
pub const FORBIDDEN_ALGORITHMS: &[&str] = &["none"];

/// Accepted JWT algorithms.
///
/// Only HS256 is issued. Other HMAC sizes are refused as well: a token that
/// names a different algorithm was not produced by this service.
pub const ACCEPTED_ALGORITHMS: &[&str] = &["HS256"];

/// Validate a JWT header algorithm against the policy above.
///
/// # Errors
///
/// Returns [`AuthError::UnsupportedAlgorithm`] if the algorithm is `none` or
/// is not in [`ACCEPTED_ALGORITHMS`].
///
/// # Examples
///
/// ```
/// use togo_authn::validation::validate_algorithm;
///
/// assert!(validate_algorithm("HS256").is_ok());
/// assert!(validate_algorithm("HS512").is_err());
/// assert!(validate_algorithm("none").is_err());
/// ```
pub fn validate_algorithm(alg: &str) -> Result<(), AuthError> {
    // Case-insensitive: "None" and "NONE" are the classic bypass spellings.
    if FORBIDDEN_ALGORITHMS.iter().any(|forbidden| forbidden.eq_ignore_ascii_case(alg)) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{}' is not allowed for security reasons",
            alg
        )));
    }

    if !ACCEPTED_ALGORITHMS.contains(&alg) {
        return Err(AuthError::unsupported_algorithm(format!(
            "Algorithm '{}' is not in accepted list (only HS256 is supported)",
            alg
        )));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_algorithm_hs256_accepted() {
        assert!(validate_algorithm("HS256").is_ok());
    }

    #[test]
    fn test_validate_algorithm_none_rejected_in_any_case() {
        for alg in ["none", "None", "NONE", "nOnE"] {
            let result = validate_algorithm(alg);
            assert!(
                matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("not allowed for security reasons")),
                "{alg} must be refused as forbidden"
            );
        }
    }

    #[test]
    fn test_validate_algorithm_other_families_rejected() {
        for alg in ["HS384", "HS512", "RS256", "EdDSA", "ES256", "hs256", ""] {
            let result = validate_algorithm(alg);
            assert!(
                matches!(result, Err(AuthError::UnsupportedAlgorithm(ref msg)) if msg.contains("not in accepted list")),
                "{alg} must be refused"
            );
        }
    }
}
