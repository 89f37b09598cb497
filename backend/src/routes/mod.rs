//! Route definitions for the Restaurant Management Platform

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, realtime, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login / refresh / logout are public)
        .nest("/auth", auth_routes(state.clone()))
        // Socket relay; the token travels in the query string
        .route("/ws", get(realtime::handle_ws))
        // Protected routes
        .merge(protected_routes(state))
}

/// Authentication routes
fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(handlers::me))
        // route_layer only wraps the routes registered above it
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
        .route("/login", post(handlers::login))
        .route("/refresh", post(handlers::refresh))
        .route("/logout", post(handlers::logout))
}

fn protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/categories", category_routes())
        .nest("/menu-items", menu_item_routes())
        .route("/menu", get(handlers::get_pos_menu))
        .nest("/orders", order_routes())
        .route("/kitchen/orders", get(handlers::kitchen_orders))
        .nest("/chats", chat_routes())
        .nest("/day-sessions", day_session_routes())
        .route(
            "/settings",
            get(handlers::get_settings).put(handlers::update_settings),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// User management routes (admin)
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route(
            "/:user_id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
}

fn category_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/order", put(handlers::reorder_categories))
        .route(
            "/:category_id",
            get(handlers::get_category)
                .put(handlers::update_category)
                .delete(handlers::delete_category),
        )
}

fn menu_item_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_menu_items).post(handlers::create_menu_item),
        )
        .route(
            "/:item_id",
            get(handlers::get_menu_item)
                .put(handlers::update_menu_item)
                .delete(handlers::delete_menu_item),
        )
        .route(
            "/:item_id/availability",
            patch(handlers::set_menu_item_availability),
        )
}

fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route(
            "/:order_id",
            get(handlers::get_order).patch(handlers::update_order),
        )
        .route("/:order_id/status", patch(handlers::update_order_status))
        .route("/:order_id/payments", post(handlers::record_payment))
        .route("/:order_id/refund", post(handlers::refund_order))
}

fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_chats).post(handlers::create_chat))
        .route("/:chat_id", get(handlers::get_chat))
        .route(
            "/:chat_id/messages",
            get(handlers::list_messages).post(handlers::send_message),
        )
        .route("/:chat_id/close", post(handlers::close_chat))
        .route("/:chat_id/reopen", post(handlers::reopen_chat))
        .route("/:chat_id/read", post(handlers::mark_chat_read))
}

fn day_session_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_day_sessions))
        .route("/current", get(handlers::current_day_session))
        .route("/open", post(handlers::open_day))
        .route("/close", post(handlers::close_day))
        .route("/:session_id", get(handlers::get_day_session))
        .route("/:session_id/summary", get(handlers::get_day_summary))
        .route("/:session_id/export", get(handlers::export_day_csv))
}
