//! Storage layer for the togo task service.
//!
//! This crate provides the byte-level [`StorageBackend`] trait and, on top of
//! it, the two domain stores the service is built from:
//!
//! - [`IdentityStore`]: user credentials and per-user daily task limits.
//! - [`TaskStore`]: task records, per-day counts, and the conditional insert
//!   that enforces the daily quota.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Service Layer (togo-server)                 │
//! │             login, create task, list tasks                  │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │   BackendIdentityStore       │      BackendTaskStore        │
//! │  (users, password digests)   │ (rows, day counters, quota)  │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │                    StorageBackend trait                     │
//! │   (get, set, compare_and_set, get_range, transaction)       │
//! ├─────────────────────────────────────────────────────────────┤
//! │                       MemoryBackend                         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use togo_storage::{
//!     BackendIdentityStore, BackendTaskStore, CalendarDay, IdentityStore, MemoryBackend,
//!     QuotaOutcome, Task, TaskStore, UserId,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!     let identities = BackendIdentityStore::new(backend.clone());
//!     let tasks = BackendTaskStore::new(backend);
//!
//!     let user = UserId::parse("firstUser").ok_or("empty id")?;
//!     identities.create_user(&user, "example", 5).await?;
//!
//!     let task = Task {
//!         id: uuid::Uuid::new_v4(),
//!         content: "write the docs".into(),
//!         user_id: user.clone(),
//!         created_date: CalendarDay::today(),
//!     };
//!     let limit = identities.get_limit(&user).await?;
//!     let outcome = tasks.insert_task_within_limit(&task, u64::from(limit)).await?;
//!     assert_eq!(outcome, QuotaOutcome::Inserted { count: 1 });
//!
//!     Ok(())
//! }
//! ```
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`]. Backends map their internal
//! failures onto [`StorageError`] variants; the stores add
//! [`StorageError::NotFound`] for missing users and surface
//! [`StorageError::Conflict`] when a conditional write keeps losing races.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers (identifier builders,
//!   seeded stores, assertion macros). Enable this in `[dev-dependencies]` of dependent crates.
//! - **`failpoints`**: Compiles the `fail` crate's injection points into [`MemoryBackend`].

#![deny(unsafe_code)]

pub mod backend;
pub mod credential;
pub mod error;
pub mod identity;
mod keys;
pub mod memory;
pub mod task;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used, clippy::panic)]
pub mod testutil;
pub mod transaction;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use credential::PasswordDigest;
pub use error::{BoxError, StorageError, StorageResult};
pub use identity::{BackendIdentityStore, IdentityStore, User};
pub use memory::MemoryBackend;
pub use task::{BackendTaskStore, DEFAULT_MAX_INSERT_ATTEMPTS, QuotaOutcome, Task, TaskStore};
pub use transaction::Transaction;
pub use types::{CalendarDay, InvalidCalendarDay, KeyValue, UserId};
