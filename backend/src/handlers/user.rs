//! Staff account handlers (admin dashboard)

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use shared::{Permission, User};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::user::{CreateUserInput, UpdateUserInput, UserService};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<Vec<User>>> {
    require_permission(&current_user.0, Permission::ManageUsers)?;

    let users = UserService::new(state.db.clone())
        .list_users(query.include_inactive)
        .await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    require_permission(&current_user.0, Permission::ManageUsers)?;

    let user = UserService::new(state.db.clone()).get_user(user_id).await?;
    Ok(Json(user))
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    require_permission(&current_user.0, Permission::ManageUsers)?;

    let user = UserService::new(state.db.clone()).create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    require_permission(&current_user.0, Permission::ManageUsers)?;

    let user = UserService::new(state.db.clone())
        .update_user(current_user.0.user_id, user_id, input)
        .await?;
    Ok(Json(user))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_permission(&current_user.0, Permission::ManageUsers)?;

    UserService::new(state.db.clone())
        .delete_user(current_user.0.user_id, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
