//! The `Authenticated` extractor.
//!
//! Any handler that takes an [`Authenticated`] argument only runs for a
//! request carrying a valid session token. Everything else is answered 401
//! before the handler body is reached.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use togo_authn::{AuthError, AuthenticatedUser, authenticate};

use crate::{error::ServiceError, state::AppState};

/// Identity of the caller, proven by its token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authenticated(pub AuthenticatedUser);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|value| {
                value
                    .to_str()
                    .map_err(|_| AuthError::invalid_token_format("authorization header is not ASCII"))
            })
            .transpose()
            .map_err(ServiceError::InvalidToken)?;

        authenticate(&state.codec, header, state.clock.now()).map(Self).map_err(|e| {
            tracing::warn!(error = %e, path = %parts.uri.path(), "rejected request token");
            ServiceError::InvalidToken(e)
        })
    }
}
