//! Menu item handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use shared::{MenuItem, MenuSection, Permission};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::menu::{CreateMenuItemInput, MenuItemFilter, MenuService, UpdateMenuItemInput};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub is_available: bool,
}

pub async fn list_menu_items(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(filter): Query<MenuItemFilter>,
) -> AppResult<Json<Vec<MenuItem>>> {
    require_permission(&current_user.0, Permission::ViewMenu)?;

    let items = MenuService::new(state.db.clone()).list_items(filter).await?;
    Ok(Json(items))
}

pub async fn get_menu_item(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> AppResult<Json<MenuItem>> {
    require_permission(&current_user.0, Permission::ViewMenu)?;

    let item = MenuService::new(state.db.clone()).get_item(item_id).await?;
    Ok(Json(item))
}

pub async fn create_menu_item(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CreateMenuItemInput>,
) -> AppResult<(StatusCode, Json<MenuItem>)> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    let item = MenuService::new(state.db.clone()).create_item(input).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_menu_item(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
    Json(input): Json<UpdateMenuItemInput>,
) -> AppResult<Json<MenuItem>> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    let item = MenuService::new(state.db.clone())
        .update_item(item_id, input)
        .await?;
    Ok(Json(item))
}

pub async fn delete_menu_item(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_permission(&current_user.0, Permission::ManageMenu)?;

    MenuService::new(state.db.clone()).delete_item(item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Kitchen marks an item sold out (or back on)
pub async fn set_menu_item_availability(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(item_id): Path<Uuid>,
    Json(body): Json<AvailabilityRequest>,
) -> AppResult<Json<MenuItem>> {
    require_permission(&current_user.0, Permission::ToggleAvailability)?;

    let item = MenuService::new(state.db.clone())
        .set_availability(item_id, body.is_available)
        .await?;

    tracing::info!(
        %item_id,
        is_available = body.is_available,
        by = %current_user.0.username,
        "menu item availability changed"
    );

    Ok(Json(item))
}

/// Menu as shown on the POS
pub async fn get_pos_menu(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<MenuSection>>> {
    require_permission(&current_user.0, Permission::ViewMenu)?;

    let menu = MenuService::new(state.db.clone()).pos_menu().await?;
    Ok(Json(menu))
}
