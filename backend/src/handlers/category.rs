//! Menu category handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use shared::{Category, Permission};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::category::{
    CategoryService, CreateCategoryInput, ReorderCategoriesInput, UpdateCategoryInput,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListCategoriesQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<ListCategoriesQuery>,
) -> AppResult<Json<Vec<Category>>> {
    require_permission(&current_user.0, Permission::ViewMenu)?;

    let categories = CategoryService::new(state.db.clone())
        .list_categories(query.include_inactive)
        .await?;
    Ok(Json(categories))
}

pub async fn get_category(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    require_permission(&current_user.0, Permission::ViewMenu)?;

    let category = CategoryService::new(state.db.clone())
        .get_category(category_id)
        .await?;
    Ok(Json(category))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    let category = CategoryService::new(state.db.clone())
        .create_category(input)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(category_id): Path<Uuid>,
    Json(input): Json<UpdateCategoryInput>,
) -> AppResult<Json<Category>> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    let category = CategoryService::new(state.db.clone())
        .update_category(category_id, input)
        .await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(category_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    CategoryService::new(state.db.clone())
        .delete_category(category_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Set the display order of categories on the POS
pub async fn reorder_categories(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<ReorderCategoriesInput>,
) -> AppResult<Json<Vec<Category>>> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    let categories = CategoryService::new(state.db.clone())
        .reorder_categories(input)
        .await?;
    Ok(Json(categories))
}
