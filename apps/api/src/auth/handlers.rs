//! Axum route handlers for login, logout and the current user.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: Option<User>,
}

/// POST /api/v1/login
///
/// Forwards the credentials to the login endpoint and stores the returned user.
pub async fn handle_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.login.login(&request.name, &request.password).await?;
    state.user.set(user.clone()).await?;
    Ok(Json(UserResponse { user: Some(user) }))
}

/// POST /api/v1/logout
pub async fn handle_logout(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if let Some(user) = state.user.clear().await? {
        info!(user = %user.name, "Logged out");
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/me
pub async fn handle_me(State(state): State<AppState>) -> Json<UserResponse> {
    Json(UserResponse {
        user: state.user.current().await,
    })
}
