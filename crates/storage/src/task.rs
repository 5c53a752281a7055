//! Task store: task records and per-user, per-day counts.
//!
//! [`BackendTaskStore`] keeps each task as a JSON row under
//! `tasks/{hex(user)}/{day}/{seq}` and a per-day row counter under
//! `task-counts/{hex(user)}/{day}`. The counter is only ever written in the
//! same transaction as a row, through a compare-and-set against the value
//! that was read, so it always equals the number of rows for that day.
//!
//! # Quota enforcement
//!
//! [`TaskStore::insert_task_within_limit`] is the conditional insert the task
//! service relies on. The limit check and the write commit together, so two
//! concurrent creations for the same user and day cannot both pass a check
//! that only one of them should pass:
//!
//! ```text
//! read counter (n) ──► n >= limit? ──yes──► LimitReached
//!                          │no
//!                          ▼
//!         txn { CAS counter n → n+1 ; set row #n } ──commit──► Inserted
//!                          │Conflict (someone else committed first)
//!                          └──────────► re-read counter (bounded)
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    keys,
    types::{CalendarDay, UserId},
};

/// Default bound on counter re-reads in a conditional insert.
pub const DEFAULT_MAX_INSERT_ATTEMPTS: u32 = 32;

/// A persisted task.
///
/// `id`, `user_id` and `created_date` are assigned by the server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Server-generated unique identifier.
    pub id: Uuid,
    /// Caller-supplied task text.
    pub content: String,
    /// Owner of the task.
    pub user_id: UserId,
    /// UTC day the task was created on.
    pub created_date: CalendarDay,
}

/// Result of a conditional insert.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuotaOutcome {
    /// The task was stored; `count` is the day's count including it.
    Inserted {
        /// Tasks stored for the day after this insert.
        count: u64,
    },
    /// The day's count had already reached `limit`; nothing was written.
    LimitReached {
        /// Tasks stored for the day.
        count: u64,
        /// The limit that was checked.
        limit: u64,
    },
}

/// Persistence for task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Number of tasks `user` created on `day`.
    async fn count_tasks(&self, user: &UserId, day: CalendarDay) -> StorageResult<u64>;

    /// Stores `task` without any limit check.
    async fn insert_task(&self, task: &Task) -> StorageResult<()>;

    /// Stores `task` only if fewer than `limit` tasks exist for its owner and
    /// creation day, atomically with respect to other inserts for that pair.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Conflict`] if contention outlasted the store's
    /// bounded number of re-reads, or any backend error.
    async fn insert_task_within_limit(&self, task: &Task, limit: u64)
    -> StorageResult<QuotaOutcome>;

    /// Tasks owned by `user`, optionally restricted to one day.
    ///
    /// Rows come back in insertion order within a day and in day order
    /// across days.
    async fn list_tasks(&self, user: &UserId, day: Option<CalendarDay>)
    -> StorageResult<Vec<Task>>;
}

/// [`TaskStore`] backed by a [`StorageBackend`].
#[derive(Clone)]
pub struct BackendTaskStore<B> {
    backend: B,
    max_attempts: u32,
}

impl<B: StorageBackend> BackendTaskStore<B> {
    /// Creates a store over `backend` with the default re-read bound.
    pub fn new(backend: B) -> Self {
        Self { backend, max_attempts: DEFAULT_MAX_INSERT_ATTEMPTS }
    }

    /// Overrides the bound on counter re-reads for conditional inserts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    async fn insert_guarded(&self, task: &Task, limit: Option<u64>) -> StorageResult<QuotaOutcome> {
        let count_key = keys::task_count_key(&task.user_id, task.created_date);
        let row = serde_json::to_vec(task)?;

        for attempt in 1..=self.max_attempts {
            let observed = self.backend.get(&count_key).await?;
            let count = observed.as_deref().map(keys::decode_count).transpose()?.unwrap_or(0);

            if let Some(limit) = limit
                && count >= limit
            {
                return Ok(QuotaOutcome::LimitReached { count, limit });
            }

            let mut txn = self.backend.transaction().await?;
            txn.compare_and_set(
                count_key.clone(),
                observed.map(|bytes| bytes.to_vec()),
                keys::encode_count(count + 1),
            )?;
            txn.set(keys::task_key(&task.user_id, task.created_date, count), row.clone());

            match txn.commit().await {
                Ok(()) => return Ok(QuotaOutcome::Inserted { count: count + 1 }),
                Err(StorageError::Conflict) => {
                    tracing::debug!(attempt, "task counter moved underneath insert, re-reading");
                },
                Err(e) => return Err(e),
            }
        }

        tracing::warn!(
            user_id = %task.user_id,
            day = %task.created_date,
            max_attempts = self.max_attempts,
            "conditional task insert gave up under contention"
        );
        Err(StorageError::conflict())
    }

    async fn scan(&self, prefix: Vec<u8>) -> StorageResult<Vec<Task>> {
        self.backend
            .get_range(keys::prefix_range(prefix))
            .await?
            .into_iter()
            .map(|kv| serde_json::from_slice(&kv.value).map_err(StorageError::from))
            .collect()
    }
}

#[async_trait]
impl<B: StorageBackend> TaskStore for BackendTaskStore<B> {
    #[tracing::instrument(skip(self), fields(day = %day))]
    async fn count_tasks(&self, user: &UserId, day: CalendarDay) -> StorageResult<u64> {
        let rows = self.backend.get_range(keys::prefix_range(keys::day_tasks_prefix(user, day))).await?;
        Ok(rows.len() as u64)
    }

    #[tracing::instrument(skip(self, task), fields(user_id = %task.user_id, day = %task.created_date))]
    async fn insert_task(&self, task: &Task) -> StorageResult<()> {
        self.insert_guarded(task, None).await.map(|_| ())
    }

    #[tracing::instrument(skip(self, task), fields(user_id = %task.user_id, day = %task.created_date))]
    async fn insert_task_within_limit(
        &self,
        task: &Task,
        limit: u64,
    ) -> StorageResult<QuotaOutcome> {
        self.insert_guarded(task, Some(limit)).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_tasks(
        &self,
        user: &UserId,
        day: Option<CalendarDay>,
    ) -> StorageResult<Vec<Task>> {
        let prefix = match day {
            Some(day) => keys::day_tasks_prefix(user, day),
            None => keys::user_tasks_prefix(user),
        };
        self.scan(prefix).await
    }
}
