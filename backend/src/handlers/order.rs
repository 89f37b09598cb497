//! Order handlers shared by the POS and the kitchen display

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use shared::{Order, PaginatedResponse, Permission};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::{require_permission, CurrentUser};
use crate::services::order::{
    CreateOrderInput, OrderFilter, OrderService, PaymentInput, UpdateOrderInput,
    UpdateStatusInput,
};
use crate::AppState;

fn order_service(state: &AppState) -> OrderService {
    OrderService::new(state.db.clone(), state.events.clone())
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Json(input): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    require_permission(&current_user.0, Permission::CreateOrder)?;

    let order = order_service(&state)
        .create_order(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Query(filter): Query<OrderFilter>,
) -> AppResult<Json<PaginatedResponse<Order>>> {
    require_permission(&current_user.0, Permission::ViewOrders)?;

    let orders = order_service(&state).list_orders(filter).await?;
    Ok(Json(orders))
}

pub async fn get_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    require_permission(&current_user.0, Permission::ViewOrders)?;

    let order = order_service(&state).get_order(order_id).await?;
    Ok(Json(order))
}

pub async fn update_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateOrderInput>,
) -> AppResult<Json<Order>> {
    require_permission(&current_user.0, Permission::EditOrder)?;

    let order = order_service(&state).update_order(order_id, input).await?;
    Ok(Json(order))
}

/// Which statuses a role may set is decided per target status
pub async fn update_order_status(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<UpdateStatusInput>,
) -> AppResult<Json<Order>> {
    require_permission(&current_user.0, Permission::ViewOrders)?;

    let order = order_service(&state)
        .update_status(current_user.0.role, order_id, input)
        .await?;
    Ok(Json(order))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(order_id): Path<Uuid>,
    Json(input): Json<PaymentInput>,
) -> AppResult<Json<Order>> {
    require_permission(&current_user.0, Permission::TakePayment)?;

    let order = order_service(&state).record_payment(order_id, input).await?;
    Ok(Json(order))
}

pub async fn refund_order(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
    Path(order_id): Path<Uuid>,
) -> AppResult<Json<Order>> {
    require_permission(&current_user.0, Permission::RefundPayment)?;

    let order = order_service(&state).refund(order_id).await?;
    Ok(Json(order))
}

/// Kitchen display queue
pub async fn kitchen_orders(
    State(state): State<AppState>,
    Extension(current_user): Extension<CurrentUser>,
) -> AppResult<Json<Vec<Order>>> {
    require_permission(&current_user.0, Permission::ViewOrders)?;

    let orders = order_service(&state).kitchen_queue().await?;
    Ok(Json(orders))
}
