//! Authentication handlers

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use shared::{Permission, User};

use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::services::{AuthService, UserService};
use crate::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// The signed-in user and what their role allows
#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub permissions: Vec<Permission>,
}

/// Login endpoint handler
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service
        .login(body.username.trim(), &body.password)
        .await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
    }))
}

/// Refresh token endpoint handler
pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let auth_service = AuthService::new(state.db.clone(), &state.config);
    let tokens = auth_service.refresh_token(&body.refresh_token).await?;

    Ok(Json(LoginResponse {
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
        expires_in: tokens.expires_in,
    }))
}

/// Logout endpoint handler
pub async fn logout(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<StatusCode, AppError> {
    AuthService::new(state.db.clone(), &state.config)
        .logout(&body.refresh_token)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Current user endpoint handler
pub async fn me(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<MeResponse>, AppError> {
    let user = UserService::new(state.db.clone())
        .get_user(current_user.0.user_id)
        .await?;
    let permissions = Permission::ALL
        .iter()
        .copied()
        .filter(|p| user.role.can(*p))
        .collect();

    Ok(Json(MeResponse { user, permissions }))
}
