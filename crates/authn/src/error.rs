//! Authentication error types.
//!
//! This module defines errors that can occur while issuing or verifying
//! session tokens.

use thiserror::Error;

/// Authentication errors.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]`; downstream match expressions
/// must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    /// No token was presented.
    #[error("Missing token")]
    MissingToken,

    /// Malformed JWT - cannot be decoded.
    #[error("Invalid token format: {0}")]
    InvalidTokenFormat(String),

    /// Token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// Signature verification failed.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Required claim is missing.
    #[error("Missing claim: {0}")]
    MissingClaim(String),

    /// Algorithm not in allowed list.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// A token could not be produced.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// The signing secret is unusable.
    #[error("Invalid signing secret: {0}")]
    InvalidSecret(String),
}

impl AuthError {
    /// Creates an [`AuthError::InvalidTokenFormat`].
    pub fn invalid_token_format(message: impl Into<String>) -> Self {
        Self::InvalidTokenFormat(message.into())
    }

    /// Creates an [`AuthError::MissingClaim`].
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim(claim.into())
    }

    /// Creates an [`AuthError::UnsupportedAlgorithm`].
    pub fn unsupported_algorithm(message: impl Into<String>) -> Self {
        Self::UnsupportedAlgorithm(message.into())
    }

    /// Creates an [`AuthError::TokenExpired`].
    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    /// Whether this error means the presented token must be refused, as
    /// opposed to a failure on the issuing side.
    #[must_use]
    pub fn is_invalid_token(&self) -> bool {
        !matches!(self, Self::SigningFailed(_) | Self::InvalidSecret(_))
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::InvalidToken => {
                AuthError::InvalidTokenFormat("Invalid JWT structure".into())
            },
            ErrorKind::InvalidSignature => AuthError::InvalidSignature,
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            ErrorKind::InvalidAlgorithm => {
                AuthError::UnsupportedAlgorithm("Algorithm not supported".into())
            },
            ErrorKind::MissingRequiredClaim(claim) => AuthError::MissingClaim(claim.clone()),
            _ => AuthError::InvalidTokenFormat(format!("JWT error: {}", err)),
        }
    }
}

/// Result type alias for authentication operations.
pub type Result<T> = std::result::Result<T, AuthError>;
