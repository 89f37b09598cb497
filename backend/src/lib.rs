//! Restaurant Management Platform - Backend
//!
//! One service behind the admin dashboard, the point-of-sale app and the
//! kitchen display: REST endpoints for menu, orders, payments, chat, day
//! sessions and settings, plus a socket relay for live updates.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migrate;
pub mod realtime;
pub mod routes;
pub mod services;

pub use config::Config;
pub use realtime::EventHub;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub events: EventHub,
}

impl AppState {
    pub fn new(db: sqlx::PgPool, config: Config) -> Self {
        let events = EventHub::new(config.realtime.channel_capacity);
        Self {
            db,
            config: Arc::new(config),
            events,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "Restaurant Management Platform API v1.0"
}
