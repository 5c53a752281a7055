//! HTTP handlers.

use axum::{
    Form, Json,
    body::Bytes,
    extract::{
        Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use togo_storage::Task;

use crate::{auth::Authenticated, error::ServiceError, service, state::AppState};

/// Login fields, read from the query string or a urlencoded body.
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    /// Identity to log in as.
    pub user_id: Option<String>,
    /// The identity's password.
    pub password: Option<String>,
}

impl LoginForm {
    /// Fields present in `self` win over those in `fallback`.
    fn or(self, fallback: Self) -> Self {
        Self {
            user_id: self.user_id.or(fallback.user_id),
            password: self.password.or(fallback.password),
        }
    }
}

/// Unreadable login query strings count as failed logins.
fn login_query(
    query: Result<Query<LoginForm>, QueryRejection>,
) -> Result<LoginForm, ServiceError> {
    query.map(|Query(form)| form).map_err(|rejection| {
        tracing::debug!(%rejection, "login query rejected");
        ServiceError::AuthenticationFailed
    })
}

/// `GET /tasks` query.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Restricts the listing to one `YYYY-MM-DD` day.
    pub created_date: Option<String>,
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// Server version.
    pub version: &'static str,
}

/// `GET /login?user_id=..&password=..`
pub async fn login_get(
    State(state): State<AppState>,
    query: Result<Query<LoginForm>, QueryRejection>,
) -> Result<String, ServiceError> {
    let form = login_query(query)?;
    service::login(&state, form.user_id.as_deref(), form.password.as_deref()).await
}

/// `POST /login` with a urlencoded body. Query fields fill in whatever the
/// body leaves out.
pub async fn login_post(
    State(state): State<AppState>,
    query: Result<Query<LoginForm>, QueryRejection>,
    body: Result<Form<LoginForm>, FormRejection>,
) -> Result<String, ServiceError> {
    let query = login_query(query)?;
    let form = match body {
        Ok(Form(body)) => body.or(query),
        Err(rejection) => {
            tracing::debug!(%rejection, "login body not used");
            query
        },
    };
    service::login(&state, form.user_id.as_deref(), form.password.as_deref()).await
}

/// `GET /tasks`
pub async fn tasks_get(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Task>>, ServiceError> {
    let Query(query) =
        query.map_err(|rejection| ServiceError::invalid_request(rejection.body_text()))?;
    service::list_tasks(&state, &caller, query.created_date.as_deref()).await.map(Json)
}

/// `POST /tasks`
pub async fn tasks_post(
    State(state): State<AppState>,
    Authenticated(caller): Authenticated,
    body: Bytes,
) -> Result<Json<Task>, ServiceError> {
    service::create_task(&state, &caller, &body).await.map(Json)
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let version = env!("CARGO_PKG_VERSION");
    match state.health.check().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse { status: "healthy", version })),
        Err(e) => {
            tracing::error!(error = %e, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: "unhealthy", version }))
        },
    }
}

/// Fallback for unknown paths.
pub async fn not_found() -> ServiceError {
    ServiceError::NotFound
}

/// Fallback for known paths hit with the wrong method.
pub async fn method_not_allowed() -> ServiceError {
    ServiceError::MethodNotAllowed
}
