//! Day session handlers

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::Serialize;
use shared::{DaySession, DaySummary, PaginatedResponse, Permission};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{require_permission, CurrentUser};
use crate::services::day_session::{
    CloseDayInput, DaySessionQuery, DaySessionService, OpenDayInput,
};
use crate::AppState;

#[derive(Serialize)]
pub struct CloseDayResponse {
    pub session: DaySession,
    pub summary: DaySummary,
}

fn day_service(state: &AppState) -> DaySessionService {
    DaySessionService::new(state.db.clone(), state.events.clone())
}

/// The open session; 404 when the day has not been opened
pub async fn current_day_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<DaySession>> {
    require_permission(&current_user.0, Permission::ViewOrders)?;

    day_service(&state)
        .current()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Open day session"))
}

pub async fn open_day(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<OpenDayInput>,
) -> AppResult<(StatusCode, Json<DaySession>)> {
    require_permission(&current_user.0, Permission::ManageDay)?;

    let session = day_service(&state)
        .open(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn close_day(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CloseDayInput>,
) -> AppResult<Json<CloseDayResponse>> {
    require_permission(&current_user.0, Permission::ManageDay)?;

    let (session, summary) = day_service(&state)
        .close(current_user.0.user_id, input)
        .await?;
    Ok(Json(CloseDayResponse { session, summary }))
}

pub async fn list_day_sessions(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(query): Query<DaySessionQuery>,
) -> AppResult<Json<PaginatedResponse<DaySession>>> {
    require_permission(&current_user.0, Permission::ViewReports)?;

    let sessions = day_service(&state).list(query).await?;
    Ok(Json(sessions))
}

pub async fn get_day_session(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<DaySession>> {
    require_permission(&current_user.0, Permission::ViewReports)?;

    let session = day_service(&state).get(session_id).await?;
    Ok(Json(session))
}

pub async fn get_day_summary(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<DaySummary>> {
    require_permission(&current_user.0, Permission::ViewReports)?;

    let summary = day_service(&state).summary(session_id).await?;
    Ok(Json(summary))
}

/// Download the day's orders as CSV
pub async fn export_day_csv(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    require_permission(&current_user.0, Permission::ViewReports)?;

    let csv = day_service(&state).export_csv(session_id).await?;
    let disposition = format!("attachment; filename=\"day_{}.csv\"", session_id);

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    ))
}
