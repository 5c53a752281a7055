//! Shared test utilities for the storage layer.
//!
//! Builders for identifiers and tasks, a helper that seeds users into fresh
//! stores, and assertion macros over [`StorageResult`]. Feature-gated behind
//! `testutil` so none of it reaches production builds.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! togo-storage = { workspace = true, features = ["testutil"] }
//! ```
//!
//! ```no_run
//! // Requires the `testutil` feature to be enabled.
//! use togo_storage::testutil::{day, seeded_stores, task_for, user_id};
//! ```

use uuid::Uuid;

use crate::{
    error::{StorageError, StorageResult},
    identity::{BackendIdentityStore, IdentityStore},
    memory::MemoryBackend,
    task::{BackendTaskStore, Task},
    types::{CalendarDay, UserId},
};

/// Builds a [`UserId`], panicking on the empty string.
#[must_use]
pub fn user_id(raw: &str) -> UserId {
    UserId::parse(raw).expect("test user id must be non-empty")
}

/// Parses a `YYYY-MM-DD` literal.
#[must_use]
pub fn day(raw: &str) -> CalendarDay {
    raw.parse().expect("test day must be YYYY-MM-DD")
}

/// A fresh task owned by `user` on `on`.
#[must_use]
pub fn task_for(user: &UserId, on: CalendarDay, content: &str) -> Task {
    Task { id: Uuid::new_v4(), content: content.to_owned(), user_id: user.clone(), created_date: on }
}

/// Identity and task stores sharing one [`MemoryBackend`], with `users`
/// registered as `(id, password, max_tasks_per_day)`.
///
/// # Panics
///
/// Panics if a user cannot be created (duplicate id in `users`).
pub async fn seeded_stores(
    users: &[(&str, &str, u32)],
) -> (MemoryBackend, BackendIdentityStore<MemoryBackend>, BackendTaskStore<MemoryBackend>) {
    let backend = MemoryBackend::new();
    let identities = BackendIdentityStore::new(backend.clone());
    for (id, password, limit) in users {
        identities.create_user(&user_id(id), password, *limit).await.expect("seed user");
    }
    let tasks = BackendTaskStore::new(backend.clone());
    (backend, identities, tasks)
}

/// Assert that a [`StorageResult`] is a [`StorageError::Conflict`].
///
/// # Examples
///
/// ```no_run
/// // Requires the `testutil` feature to be enabled.
/// use togo_storage::assert_conflict;
/// use togo_storage::error::{StorageError, StorageResult};
///
/// let result: StorageResult<()> = Err(StorageError::Conflict);
/// assert_conflict!(result);
/// ```
#[macro_export]
macro_rules! assert_conflict {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "expected StorageError::Conflict, got: {:?}",
            $result,
        );
    };
    ($result:expr, $msg:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::Conflict)),
            "{}: expected StorageError::Conflict, got: {:?}",
            $msg,
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok` and yield the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("{}: expected Ok, got StorageError: {e:?}", $msg),
        }
    };
}

/// Whether `result` is a [`StorageError::Conflict`].
pub fn is_conflict<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::Conflict))
}
