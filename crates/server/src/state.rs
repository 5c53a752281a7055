//! Shared application state.

use std::sync::Arc;

use async_trait::async_trait;
use togo_authn::TokenCodec;
use togo_storage::{
    BackendIdentityStore, BackendTaskStore, IdentityStore, StorageBackend, StorageResult,
    TaskStore,
};

use crate::clock::{Clock, SystemClock};

/// Backend liveness as seen by the `/health` route.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Succeeds when the backing store can serve requests.
    async fn check(&self) -> StorageResult<()>;
}

#[async_trait]
impl<B: StorageBackend> HealthProbe for B {
    async fn check(&self) -> StorageResult<()> {
        self.health_check().await
    }
}

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Issues and verifies session tokens.
    pub codec: Arc<TokenCodec>,
    /// User credentials and limits.
    pub identities: Arc<dyn IdentityStore>,
    /// Task rows and daily counts.
    pub tasks: Arc<dyn TaskStore>,
    /// Source of "now" and "today".
    pub clock: Arc<dyn Clock>,
    /// Backend health.
    pub health: Arc<dyn HealthProbe>,
}

impl AppState {
    /// Builds state with both stores over one `backend`, using the system
    /// clock.
    pub fn new<B>(codec: TokenCodec, backend: B, quota_max_attempts: u32) -> Self
    where
        B: StorageBackend + Clone + 'static,
    {
        Self::with_clock(codec, backend, quota_max_attempts, Arc::new(SystemClock))
    }

    /// Like [`new`](Self::new) with an explicit clock.
    pub fn with_clock<B>(
        codec: TokenCodec,
        backend: B,
        quota_max_attempts: u32,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        B: StorageBackend + Clone + 'static,
    {
        Self {
            codec: Arc::new(codec),
            identities: Arc::new(BackendIdentityStore::new(backend.clone())),
            tasks: Arc::new(
                BackendTaskStore::new(backend.clone()).with_max_attempts(quota_max_attempts),
            ),
            clock,
            health: Arc::new(backend),
        }
    }
}
