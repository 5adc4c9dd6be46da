//! Route table and handlers.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use renfound_application::{DeleteCurrentUser, FindUserByExternalId, GetCurrentUser};
use renfound_domain::{TokenPair, User};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::info;

use crate::error::{ApiError, FieldError};
use crate::extract::{AuthenticatedUser, RequestClient, Validate, ValidatedJson, require};
use crate::state::AppState;

/// `POST /api/auth/telegram` body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Raw init-data query string from the Mini App.
    #[serde(default, rename = "initData")]
    pub init_data: String,
}

impl Validate for LoginRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require(&mut errors, "initData", &self.init_data);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Body of refresh and logout.
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    /// A refresh token from a previous pair.
    #[serde(default)]
    pub refresh_token: String,
}

impl Validate for RefreshRequest {
    fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        require(&mut errors, "refresh_token", &self.refresh_token);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Acknowledgement for state-changing calls.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable outcome.
    pub message: &'static str,
}

impl SuccessResponse {
    const fn ok(message: &'static str) -> Json<Self> {
        Json(Self {
            success: true,
            message,
        })
    }
}

/// All API routes, without middleware.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/telegram", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/logout-all", post(logout_all))
        .route("/api/users/me", get(current_user).delete(delete_current_user))
        .route("/api/users/telegram/{telegram_id}", get(user_by_telegram_id))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn login(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    ValidatedJson(body): ValidatedJson<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state.auth.login(&body.init_data, client).await?;
    Ok(Json(pair))
}

async fn refresh(
    State(state): State<AppState>,
    RequestClient(client): RequestClient,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
    let pair = state.auth.refresh(&body.refresh_token, client).await?;
    Ok(Json(pair))
}

async fn logout(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<RefreshRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.auth.logout(&body.refresh_token).await?;
    Ok(SuccessResponse::ok("Logged out successfully"))
}

async fn logout_all(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.auth.logout_all(caller.user_id).await?;
    Ok(SuccessResponse::ok("All sessions logged out successfully"))
}

async fn current_user(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<User>, ApiError> {
    let user = GetCurrentUser::new(state.users.clone())
        .execute(caller.user_id)
        .await?;
    Ok(Json(user))
}

async fn delete_current_user(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<SuccessResponse>, ApiError> {
    DeleteCurrentUser::new(state.users.clone(), state.sessions.clone())
        .execute(caller.user_id)
        .await?;
    info!(user_id = %caller.user_id, external_id = caller.external_id, "user deleted");
    Ok(SuccessResponse::ok("User deleted successfully"))
}

async fn user_by_telegram_id(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(telegram_id): Path<i64>,
) -> Result<Json<User>, ApiError> {
    let user = FindUserByExternalId::new(state.users.clone())
        .execute(telegram_id)
        .await?;
    Ok(Json(user))
}
