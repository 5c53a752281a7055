//! Service errors and their HTTP rendering.
//!
//! Every failure a handler can produce is a [`ServiceError`]. The mapping to
//! a status code and client message lives here and nowhere else. Server-side
//! failures are logged with their source chain and answered with a generic
//! message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use togo_authn::AuthError;
use togo_storage::{StorageError, UserId};

use crate::config::ConfigError;

/// Message returned for every 5xx response.
const GENERIC_MESSAGE: &str = "internal server error";

/// Errors surfaced by the task service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    /// Login with an unknown identity, a wrong password or a missing field.
    #[error("incorrect user_id/pwd")]
    AuthenticationFailed,

    /// The request's token is missing, malformed, forged or expired.
    #[error("invalid token: {0}")]
    InvalidToken(#[source] AuthError),

    /// The user already created their daily allowance of tasks.
    #[error("Limited to {limit} tasks per day")]
    QuotaExceeded {
        /// The user's daily limit.
        limit: u64,
    },

    /// A verified token names a user the identity store no longer knows.
    #[error("identity {0} not found")]
    IdentityNotFound(UserId),

    /// The identity or task store failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StorageError),

    /// A token could not be signed.
    #[error("token signing failed: {0}")]
    SigningError(#[source] AuthError),

    /// The request was well-formed HTTP but its query or payload was not.
    #[error("{0}")]
    InvalidRequest(String),

    /// No route matches the path.
    #[error("not found")]
    NotFound,

    /// The path exists but not for this method.
    #[error("method not allowed")]
    MethodNotAllowed,
}

impl ServiceError {
    /// Creates an `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Creates a `QuotaExceeded` error.
    #[must_use]
    pub fn quota_exceeded(limit: impl Into<u64>) -> Self {
        Self::QuotaExceeded { limit: limit.into() }
    }

    /// The HTTP status this error is answered with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed | Self::InvalidToken(_) => StatusCode::UNAUTHORIZED,
            Self::QuotaExceeded { .. } | Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::IdentityNotFound(_) | Self::StoreUnavailable(_) | Self::SigningError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// The message shown to the client, if any.
    ///
    /// Token rejections carry no body so a caller learns nothing about why
    /// its token was refused.
    #[must_use]
    pub fn client_message(&self) -> Option<String> {
        match self {
            Self::InvalidToken(_) => None,
            _ if self.status_code().is_server_error() => Some(GENERIC_MESSAGE.to_owned()),
            _ => Some(self.to_string()),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        Self::StoreUnavailable(err)
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, source = ?std::error::Error::source(&self), "request failed");
        }

        match self.client_message() {
            Some(error) => (status, Json(ErrorBody { error })).into_response(),
            None => status.into_response(),
        }
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StartupError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The token codec refused the configured secret or lifetime.
    #[error("invalid token settings: {0}")]
    Codec(#[source] AuthError),

    /// A configured seed user could not be created.
    #[error("failed to seed user '{user}': {source}")]
    Seed {
        /// The seed user's id.
        user: String,
        /// Why the store refused it.
        #[source]
        source: StorageError,
    },

    /// Binding or serving failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use std::error::Error as _;

    use axum::body::to_bytes;

    use super::*;

    async fn body_of(err: ServiceError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_authentication_failed_body() {
        let (status, body) = body_of(ServiceError::AuthenticationFailed).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, r#"{"error":"incorrect user_id/pwd"}"#);
    }

    #[tokio::test]
    async fn test_invalid_token_has_no_body() {
        let (status, body) = body_of(ServiceError::InvalidToken(AuthError::TokenExpired)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_quota_message() {
        let (status, body) = body_of(ServiceError::quota_exceeded(5u32)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Limited to 5 tasks per day"}"#);
    }

    #[tokio::test]
    async fn test_server_errors_are_generic() {
        let err = ServiceError::from(StorageError::connection("db at 10.0.0.3 refused"));
        assert!(err.source().is_some());

        let (status, body) = body_of(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("10.0.0.3"));
        assert!(body.contains(GENERIC_MESSAGE));

        let missing = ServiceError::IdentityNotFound(UserId::parse("ghost").unwrap());
        let (status, body) = body_of(missing).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("ghost"));
    }

    #[test]
    fn test_routing_statuses() {
        assert_eq!(ServiceError::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::MethodNotAllowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(ServiceError::invalid_request("bad").status_code(), StatusCode::BAD_REQUEST);
    }
}
