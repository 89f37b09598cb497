//! Restaurant settings handlers

use axum::{extract::State, Extension, Json};
use shared::{Permission, Settings};

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::settings::{SettingsService, UpdateSettingsInput};
use crate::AppState;

pub async fn get_settings(State(state): State<AppState>) -> AppResult<Json<Settings>> {
    let settings = SettingsService::new(state.db.clone()).get_settings().await?;
    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<UpdateSettingsInput>,
) -> AppResult<Json<Settings>> {
    require_permission(&current_user.0, Permission::ManageSettings)?;

    let settings = SettingsService::new(state.db.clone())
        .update_settings(input)
        .await?;
    Ok(Json(settings))
}
