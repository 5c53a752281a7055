//! Session token issuing and verification.
//!
//! A session token is an HS256-signed JWT carrying the user's identifier and
//! an expiry. [`TokenCodec`] owns the secret and is the only thing that signs
//! or checks tokens; the free functions here decode tokens *without*
//! verification and exist for diagnostics and fuzzing.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use togo_authn::TokenCodec;
//! use togo_storage::UserId;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let codec = TokenCodec::new(b"wqGyEBBfPK9w3Lxw", Duration::from_secs(15 * 60))?;
//! let user = UserId::parse("firstUser").ok_or("empty id")?;
//!
//! let token = codec.issue(&user)?;
//! let claims = codec.verify(&token)?;
//! assert_eq!(claims.user_id, "firstUser");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

use std::{fmt, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use togo_storage::UserId;

use crate::{error::AuthError, validation::validate_algorithm};

/// Default lifetime of an issued token.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);

/// JWT claims carried by a session token.
///
/// ```json
/// { "user_id": "firstUser", "iat": 1760572800, "exp": 1760573700 }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Identifier of the authenticated user.
    #[serde(default)]
    pub user_id: String,
    /// Expiration time (seconds since epoch).
    pub exp: i64,
    /// Issued at (seconds since epoch).
    #[serde(default)]
    pub iat: i64,
}

impl TokenClaims {
    /// The `user_id` claim as a [`UserId`].
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingClaim`] if the claim is empty.
    pub fn require_user_id(&self) -> Result<UserId, AuthError> {
        UserId::parse(self.user_id.as_str()).ok_or_else(|| AuthError::missing_claim("user_id"))
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

fn segments(token: &str) -> Result<[&str; 3], AuthError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(header), Some(payload), Some(signature), None) => Ok([header, payload, signature]),
        _ => Err(AuthError::invalid_token_format("JWT must have 3 parts separated by dots")),
    }
}

/// Read the `alg` header field without verification.
///
/// Unlike [`jsonwebtoken::decode_header`] this accepts any algorithm name,
/// including `none`, so that policy checks see exactly what was presented.
///
/// # Errors
///
/// Returns [`AuthError::InvalidTokenFormat`] if the header is not base64url
/// JSON with a string `alg`.
pub fn decode_jwt_algorithm(token: &str) -> Result<String, AuthError> {
    let [header, _, _] = segments(token)?;
    let bytes = URL_SAFE_NO_PAD.decode(header).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to decode JWT header: {}", e))
    })?;
    let header: RawHeader = serde_json::from_slice(&bytes).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to parse JWT header: {}", e))
    })?;
    Ok(header.alg)
}

/// Decode JWT claims without verification.
///
/// # Errors
///
/// Returns an error if:
/// - The JWT does not have exactly 3 parts
/// - The payload cannot be base64-decoded
/// - The payload cannot be parsed as JSON claims
pub fn decode_jwt_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let [_, payload, _] = segments(token)?;

    let payload_bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        AuthError::invalid_token_format(format!("Failed to decode JWT payload: {}", e))
    })?;

    serde_json::from_slice(&payload_bytes)
        .map_err(|e| AuthError::invalid_token_format(format!("Failed to parse JWT claims: {}", e)))
}

/// Validate decoded claims at instant `now`.
///
/// A token is valid strictly before its `exp`; at `exp` it is already
/// expired. No leeway is applied.
///
/// # Errors
///
/// Returns [`AuthError::TokenExpired`] when `now >= exp`, or
/// [`AuthError::MissingClaim`] when `user_id` is empty.
pub fn validate_claims(claims: &TokenClaims, now: DateTime<Utc>) -> Result<UserId, AuthError> {
    if now.timestamp() >= claims.exp {
        return Err(AuthError::token_expired());
    }
    claims.require_user_id()
}

/// Issues and verifies session tokens under one HMAC secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Creates a codec signing with `secret` and issuing tokens valid for
    /// `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidSecret`] if `secret` is empty or `ttl` is
    /// zero.
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::InvalidSecret("secret must not be empty".into()));
        }
        if ttl.is_zero() {
            return Err(AuthError::InvalidSecret("token lifetime must be positive".into()));
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        })
    }

    /// Lifetime of issued tokens.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for `user` valid from now for [`ttl`](Self::ttl).
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningFailed`] if encoding fails.
    pub fn issue(&self, user: &UserId) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now())
    }

    /// Issues a token for `user` as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SigningFailed`] if encoding fails.
    #[tracing::instrument(skip(self), fields(user_id = %user))]
    pub fn issue_at(&self, user: &UserId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs())
            .map_err(|_| AuthError::SigningFailed("token lifetime out of range".into()))?;
        let iat = now.timestamp();
        let claims = TokenClaims { user_id: user.as_str().to_owned(), exp: iat.saturating_add(ttl), iat };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::SigningFailed(e.to_string()))
    }

    /// Verifies `token` against the current time.
    ///
    /// # Errors
    ///
    /// See [`verify_at`](Self::verify_at).
    pub fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.verify_at(token, Utc::now())
    }

    /// Verifies `token` as if the current time were `now`.
    ///
    /// 1. The header `alg` must pass [`validate_algorithm`].
    /// 2. The HS256 signature must match this codec's secret.
    /// 3. `now` must be strictly before `exp` and `user_id` must be present.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] for whichever step failed.
    #[tracing::instrument(skip(self, token))]
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenClaims, AuthError> {
        let alg = decode_jwt_algorithm(token)?;
        validate_algorithm(&alg)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked below against the supplied instant.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let claims = decode::<TokenClaims>(token, &self.decoding, &validation)?.claims;
        validate_claims(&claims, now)?;

        Ok(claims)
    }
}
