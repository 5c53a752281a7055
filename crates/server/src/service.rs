//! Login, task creation and task listing.
//!
//! These functions hold the request semantics; the axum handlers only adapt
//! HTTP in and out of them.

use serde::Deserialize;
use togo_authn::AuthenticatedUser;
use togo_storage::{CalendarDay, QuotaOutcome, StorageError, Task, UserId};
use uuid::Uuid;

use crate::{error::ServiceError, state::AppState};

/// Caller-controlled part of a new task. Any other field in the body,
/// including an id, owner or date, is ignored.
#[derive(Debug, Default, Deserialize)]
struct TaskPayload {
    #[serde(default)]
    content: String,
}

/// Exchanges credentials for a session token.
///
/// An absent or empty field fails exactly like a wrong password.
///
/// # Errors
///
/// - [`ServiceError::AuthenticationFailed`] for bad or missing credentials
/// - [`ServiceError::StoreUnavailable`] if the identity store fails
/// - [`ServiceError::SigningError`] if the token cannot be signed
pub async fn login(
    state: &AppState,
    user_id: Option<&str>,
    password: Option<&str>,
) -> Result<String, ServiceError> {
    let (Some(user), Some(password)) = (user_id.and_then(UserId::parse), password) else {
        tracing::warn!("login without credentials");
        return Err(ServiceError::AuthenticationFailed);
    };
    if password.is_empty() {
        tracing::warn!(user_id = %user, "login with empty password");
        return Err(ServiceError::AuthenticationFailed);
    }

    if !state.identities.validate_credential(&user, password).await? {
        tracing::warn!(user_id = %user, "login rejected");
        return Err(ServiceError::AuthenticationFailed);
    }

    let token = state.codec.issue_at(&user, state.clock.now()).map_err(ServiceError::SigningError)?;
    tracing::debug!(user_id = %user, "issued session token");
    Ok(token)
}

/// Creates a task for `caller` if today's quota allows it.
///
/// The quota check runs before the payload is parsed, so an exhausted quota
/// is reported even for a malformed body.
///
/// # Errors
///
/// - [`ServiceError::IdentityNotFound`] if the caller no longer exists
/// - [`ServiceError::QuotaExceeded`] if today's limit is reached
/// - [`ServiceError::InvalidRequest`] for a body that is not a task object
/// - [`ServiceError::StoreUnavailable`] if a store fails
#[tracing::instrument(skip(state, caller, body), fields(user_id = %caller.user_id))]
pub async fn create_task(
    state: &AppState,
    caller: &AuthenticatedUser,
    body: &[u8],
) -> Result<Task, ServiceError> {
    let user = &caller.user_id;
    let limit = match state.identities.get_limit(user).await {
        Ok(limit) => u64::from(limit),
        Err(StorageError::NotFound { .. }) => {
            return Err(ServiceError::IdentityNotFound(user.clone()));
        },
        Err(e) => return Err(e.into()),
    };

    let today = CalendarDay::from_utc(state.clock.now());
    let count = state.tasks.count_tasks(user, today).await?;
    if count >= limit {
        tracing::debug!(count, limit, "daily quota exhausted");
        return Err(ServiceError::quota_exceeded(limit));
    }

    let payload: TaskPayload = serde_json::from_slice(body)
        .map_err(|_| ServiceError::invalid_request("invalid task payload"))?;
    let task =
        Task { id: Uuid::new_v4(), content: payload.content, user_id: user.clone(), created_date: today };

    match state.tasks.insert_task_within_limit(&task, limit).await? {
        QuotaOutcome::Inserted { count } => {
            tracing::debug!(task_id = %task.id, count, limit, "task created");
            Ok(task)
        },
        QuotaOutcome::LimitReached { count, limit } => {
            tracing::debug!(count, limit, "daily quota exhausted by a concurrent creation");
            Err(ServiceError::quota_exceeded(limit))
        },
    }
}

/// Lists the caller's tasks, optionally for one `created_date`.
///
/// An absent or empty date means every day.
///
/// # Errors
///
/// - [`ServiceError::InvalidRequest`] if the date is not `YYYY-MM-DD`
/// - [`ServiceError::StoreUnavailable`] if the task store fails
pub async fn list_tasks(
    state: &AppState,
    caller: &AuthenticatedUser,
    created_date: Option<&str>,
) -> Result<Vec<Task>, ServiceError> {
    let day = match created_date.map(str::trim).filter(|raw| !raw.is_empty()) {
        Some(raw) => Some(
            raw.parse::<CalendarDay>()
                .map_err(|e| ServiceError::invalid_request(e.to_string()))?,
        ),
        None => None,
    };

    Ok(state.tasks.list_tasks(&caller.user_id, day).await?)
}
