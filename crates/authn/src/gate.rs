//! Request authentication gate.
//!
//! Turns the raw `Authorization` header of a request into an
//! [`AuthenticatedUser`], or refuses it. Both `Bearer <token>` and a bare
//! token are accepted.

use chrono::{DateTime, Utc};
use togo_storage::UserId;

use crate::{error::AuthError, jwt::TokenCodec};

/// Identity established for one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// The user the token was issued to.
    pub user_id: UserId,
    /// When the presenting token stops being accepted.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Pulls the token out of an `Authorization` header value.
///
/// The `Bearer` scheme is matched case-insensitively. Returns `None` for a
/// blank value.
///
/// ```
/// use togo_authn::gate::extract_token;
///
/// assert_eq!(extract_token("Bearer abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_token("abc.def.ghi"), Some("abc.def.ghi"));
/// assert_eq!(extract_token("   "), None);
/// ```
#[must_use]
pub fn extract_token(header_value: &str) -> Option<&str> {
    let value = header_value.trim();
    let token = match value.split_once(' ') {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
        _ => value,
    };
    (!token.is_empty()).then_some(token)
}

/// Authenticates a request from its `Authorization` header value.
///
/// # Errors
///
/// Returns [`AuthError::MissingToken`] when no token is present, otherwise
/// whatever [`TokenCodec::verify_at`] rejects the token with.
pub fn authenticate(
    codec: &TokenCodec,
    header_value: Option<&str>,
    now: DateTime<Utc>,
) -> Result<AuthenticatedUser, AuthError> {
    let token = header_value.and_then(extract_token).ok_or(AuthError::MissingToken)?;

    let claims = codec.verify_at(token, now).inspect_err(|e| {
        tracing::debug!(error = %e, "rejected session token");
    })?;
    let user_id = claims.require_user_id()?;

    Ok(AuthenticatedUser { user_id, expires_at: claims.expires_at() })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::jwt::DEFAULT_TOKEN_TTL;

    fn codec() -> TokenCodec {
        TokenCodec::new(b"gate-test-secret", DEFAULT_TOKEN_TTL).unwrap()
    }

    #[test]
    fn test_extract_token_schemes() {
        assert_eq!(extract_token("bearer t"), Some("t"));
        assert_eq!(extract_token("BEARER   t  "), Some("t"));
        assert_eq!(extract_token("Bearer "), Some("Bearer"));
        assert_eq!(extract_token(""), None);
    }

    #[test]
    fn test_authenticate_accepts_bearer_and_bare() {
        let codec = codec();
        let user = UserId::parse("firstUser").unwrap();
        let now = Utc::now();
        let token = codec.issue_at(&user, now).unwrap();

        let bearer = format!("Bearer {token}");
        let via_bearer = authenticate(&codec, Some(&bearer), now).unwrap();
        let via_bare = authenticate(&codec, Some(&token), now).unwrap();

        assert_eq!(via_bearer.user_id, user);
        assert_eq!(via_bearer, via_bare);
    }

    #[test]
    fn test_authenticate_missing_header() {
        assert!(matches!(authenticate(&codec(), None, Utc::now()), Err(AuthError::MissingToken)));
        assert!(matches!(
            authenticate(&codec(), Some("  "), Utc::now()),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn test_authenticate_garbage_is_invalid_token() {
        let err = authenticate(&codec(), Some("Bearer not-a-jwt"), Utc::now()).unwrap_err();
        assert!(err.is_invalid_token());
    }
}
