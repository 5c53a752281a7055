//! # togo Server
//!
//! HTTP surface of the togo task service.
//!
//! | Route | Auth | Result |
//! |-------|------|--------|
//! | `GET\|POST /login` | none | session token as plain text |
//! | `GET /tasks[?created_date=YYYY-MM-DD]` | token | JSON array of the caller's tasks |
//! | `POST /tasks` | token | JSON of the created task, subject to the daily quota |
//! | `GET /health` | none | backend health and version |
//! | `OPTIONS *` | none | empty 200 |
//!
//! Every response carries wildcard CORS headers.
//!
//! ## Example
//!
//! ```
//! use togo_server::{bootstrap, config::ServerConfig};
//! use togo_storage::MemoryBackend;
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let config = ServerConfig::builder()
//!     .jwt_secret("wqGyEBBfPK9w3Lxw")
//!     .seed_users(vec!["firstUser:example:5".parse().unwrap()])
//!     .build()
//!     .unwrap();
//! let router = bootstrap(&config, MemoryBackend::new()).await.unwrap();
//! # drop(router);
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// The `Authenticated` request extractor.
pub mod auth;
/// Time source.
pub mod clock;
/// Server configuration.
pub mod config;
/// Service and startup errors.
pub mod error;
/// HTTP handlers.
pub mod handlers;
/// Router construction.
pub mod routes;
/// Request semantics behind the handlers.
pub mod service;
/// Shared application state.
pub mod state;

use axum::Router;
pub use error::{ServiceError, StartupError};
pub use routes::{create_router, create_router_with_timeout};
pub use state::AppState;
use togo_authn::TokenCodec;
use togo_storage::{BackendIdentityStore, IdentityStore, StorageBackend, UserId};

use crate::config::ServerConfig;

/// Seeds the configured users into `backend` and builds the router.
///
/// # Errors
///
/// Returns [`StartupError`] if the token settings are refused or a seed user
/// cannot be created.
pub async fn bootstrap<B>(config: &ServerConfig, backend: B) -> Result<Router, StartupError>
where
    B: StorageBackend + Clone + 'static,
{
    let codec = TokenCodec::new(config.jwt_secret().expose().as_bytes(), config.token_ttl())
        .map_err(StartupError::Codec)?;

    let identities = BackendIdentityStore::new(backend.clone());
    for seed in config.seed_users() {
        let user = UserId::parse(seed.id.as_str()).ok_or_else(|| StartupError::Seed {
            user: seed.id.clone(),
            source: togo_storage::StorageError::internal("empty user id"),
        })?;
        identities
            .create_user(&user, seed.password.expose(), seed.max_tasks_per_day)
            .await
            .map_err(|source| StartupError::Seed { user: seed.id.clone(), source })?;
        tracing::info!(user_id = %user, max_tasks_per_day = seed.max_tasks_per_day, "seeded user");
    }

    let state = AppState::new(codec, backend, config.quota_max_attempts());
    Ok(create_router_with_timeout(state, config.request_timeout()))
}
