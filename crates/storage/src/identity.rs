//! Identity store: user credentials and per-user daily task limits.
//!
//! The [`IdentityStore`] trait is the narrow interface the login flow and the
//! task creator depend on. [`BackendIdentityStore`] implements it on top of
//! any [`StorageBackend`], storing one JSON [`User`] record per user under
//! `users/{hex(id)}`.
//!
//! ```no_run
//! use togo_storage::{BackendIdentityStore, IdentityStore, MemoryBackend, UserId};
//!
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! let store = BackendIdentityStore::new(MemoryBackend::new());
//! let id = UserId::parse("firstUser").unwrap();
//!
//! store.create_user(&id, "example", 5).await.unwrap();
//! assert!(store.validate_credential(&id, "example").await.unwrap());
//! assert_eq!(store.get_limit(&id).await.unwrap(), 5);
//! # });
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    backend::StorageBackend,
    credential::PasswordDigest,
    error::{StorageError, StorageResult},
    keys,
    types::UserId,
};

/// A stored user account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// The user's identity.
    pub id: UserId,
    /// Salted digest of the user's password.
    pub password: PasswordDigest,
    /// How many tasks the user may create per calendar day.
    pub max_tasks_per_day: u32,
}

/// Persistence for user credentials and quotas.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Checks `password` against the stored credential for `user`.
    ///
    /// Returns `Ok(false)` both for an unknown user and for a wrong password;
    /// callers must not be able to tell the two apart.
    ///
    /// # Errors
    ///
    /// Returns an error only when the backing store fails.
    async fn validate_credential(&self, user: &UserId, password: &str) -> StorageResult<bool>;

    /// Returns the user's daily task limit.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the user does not exist.
    async fn get_limit(&self, user: &UserId) -> StorageResult<u32>;

    /// Registers a new user.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the user already exists.
    async fn create_user(
        &self,
        user: &UserId,
        password: &str,
        max_tasks_per_day: u32,
    ) -> StorageResult<()>;
}

/// [`IdentityStore`] backed by a [`StorageBackend`].
#[derive(Clone)]
pub struct BackendIdentityStore<B> {
    backend: B,
}

impl<B: StorageBackend> BackendIdentityStore<B> {
    /// Creates a store over `backend`.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    async fn load(&self, user: &UserId) -> StorageResult<Option<User>> {
        match self.backend.get(&keys::user_key(user)).await? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl<B: StorageBackend> IdentityStore for BackendIdentityStore<B> {
    #[tracing::instrument(skip(self, password))]
    async fn validate_credential(&self, user: &UserId, password: &str) -> StorageResult<bool> {
        let valid = match self.load(user).await? {
            Some(record) => record.password.verify(password),
            None => PasswordDigest::verify_decoy(password),
        };
        Ok(valid)
    }

    #[tracing::instrument(skip(self))]
    async fn get_limit(&self, user: &UserId) -> StorageResult<u32> {
        self.load(user)
            .await?
            .map(|record| record.max_tasks_per_day)
            .ok_or_else(|| StorageError::not_found(user.to_string()))
    }

    #[tracing::instrument(skip(self, password))]
    async fn create_user(
        &self,
        user: &UserId,
        password: &str,
        max_tasks_per_day: u32,
    ) -> StorageResult<()> {
        let record =
            User { id: user.clone(), password: PasswordDigest::derive(password), max_tasks_per_day };
        let encoded = serde_json::to_vec(&record)?;

        match self.backend.compare_and_set(&keys::user_key(user), None, encoded).await {
            Err(StorageError::Conflict) => {
                Err(StorageError::internal(format!("User already exists: {user}")))
            },
            other => other,
        }
    }
}
