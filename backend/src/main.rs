//! Restaurant Management Platform - Backend Server

use std::{net::SocketAddr, time::Duration};

use sqlx::postgres::PgPoolOptions;

use restaurant_backend::{
    config::init_tracing, create_app, migrate::MigrationRunner, services::AuthService, AppState,
    Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env and initialize tracing
    init_tracing("rms_server=debug,restaurant_backend=debug,tower_http=debug,sqlx=warn");

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Restaurant Management Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Production deploys go through rms-migrate; development migrates on boot
    if config.is_development() {
        tracing::info!("Running database migrations...");
        let outcome = MigrationRunner::new(db_pool.clone(), config.migration.clone())
            .deploy(false)
            .await?;
        tracing::info!(?outcome, "Migrations completed");
    }

    if let (Some(username), Some(password)) = (
        config.bootstrap.admin_username.as_deref(),
        config.bootstrap.admin_password.as_deref(),
    ) {
        let auth = AuthService::new(db_pool.clone(), &config);
        if auth.bootstrap_admin(username, password).await? {
            tracing::info!(username, "Bootstrap admin account created");
        }
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    // Create application state
    let state = AppState::new(db_pool, config);

    // Build application
    let app = create_app(state);

    // Start server
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutdown signal received");
}
