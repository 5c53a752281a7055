//! Shared test utilities for authentication testing.
//!
//! Helpers for signing tokens with arbitrary claims or algorithms and for
//! crafting raw or tampered JWT strings (for attack testing). Feature-gated
//! behind `testutil` so none of it reaches production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! togo-authn = { workspace = true, features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use togo_authn::testutil::{TEST_SECRET, craft_raw_jwt, sign_with};
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};

use crate::jwt::{DEFAULT_TOKEN_TTL, TokenCodec};

/// Secret used by [`test_codec`].
pub const TEST_SECRET: &[u8] = b"wqGyEBBfPK9w3Lxw";

/// A codec over [`TEST_SECRET`] with the default lifetime.
///
/// # Panics
///
/// Never in practice; the secret is non-empty.
#[must_use]
pub fn test_codec() -> TokenCodec {
    TokenCodec::new(TEST_SECRET, DEFAULT_TOKEN_TTL).expect("test codec")
}

/// Signs arbitrary `claims` with `secret` under `algorithm`.
///
/// Useful for producing tokens the service itself would never issue: other
/// HMAC sizes, missing or mistyped claims.
///
/// # Panics
///
/// Panics if JWT encoding fails.
pub fn sign_with(algorithm: Algorithm, secret: &[u8], claims: &serde_json::Value) -> String {
    jsonwebtoken::encode(&Header::new(algorithm), claims, &EncodingKey::from_secret(secret))
        .expect("Failed to encode test JWT")
}

/// Creates a raw JWT string from arbitrary header and payload JSON.
///
/// The resulting JWT has the structure `{header_b64}.{payload_b64}.` with an
/// empty signature.
///
/// # Panics
///
/// Panics if JSON serialization fails.
pub fn craft_raw_jwt(header_json: &serde_json::Value, payload_json: &serde_json::Value) -> String {
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(header_json).expect("header json"));
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header_b64}.{payload_b64}.")
}

/// Replaces the payload of `token` while keeping its header and signature.
///
/// # Panics
///
/// Panics if `token` does not have three segments.
pub fn tamper_payload(token: &str, payload_json: &serde_json::Value) -> String {
    let mut parts = token.split('.');
    let (Some(header), Some(_), Some(signature)) = (parts.next(), parts.next(), parts.next())
    else {
        panic!("token must have three segments: {token}");
    };
    let payload_b64 =
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload_json).expect("payload json"));
    format!("{header}.{payload_b64}.{signature}")
}

/// Asserts that a [`Result<T, AuthError>`](crate::AuthError) is an `Err` of
/// the given variant.
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use togo_authn::assert_auth_error;
/// use togo_authn::error::AuthError;
///
/// let result: Result<(), AuthError> = Err(AuthError::token_expired());
/// assert_auth_error!(result, TokenExpired);
/// ```
#[macro_export]
macro_rules! assert_auth_error {
    ($result:expr, $variant:ident) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "expected AuthError::{}, got: {:?}",
            stringify!($variant),
            $result,
        );
    };
    ($result:expr, $variant:ident, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::AuthError::$variant { .. })),
            "{}: expected AuthError::{}, got: {:?}",
            $msg,
            stringify!($variant),
            $result,
        );
    };
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::jwt::{decode_jwt_algorithm, decode_jwt_claims};

    #[test]
    fn test_craft_raw_jwt_has_empty_signature() {
        let token = craft_raw_jwt(&json!({"alg": "none"}), &json!({"user_id": "u", "exp": 1}));
        assert!(token.ends_with('.'));
        assert_eq!(token.split('.').count(), 3);
        assert_eq!(decode_jwt_algorithm(&token).expect("alg"), "none");
    }

    #[test]
    fn test_tamper_payload_keeps_signature() {
        let original = sign_with(Algorithm::HS256, TEST_SECRET, &json!({"user_id": "a", "exp": 1}));
        let tampered = tamper_payload(&original, &json!({"user_id": "b", "exp": 1}));

        assert_eq!(original.rsplit('.').next(), tampered.rsplit('.').next());
        assert_eq!(decode_jwt_claims(&tampered).expect("claims").user_id, "b");
    }
}
