use std::panic;
use std::sync::Arc;

use report_sync::config::Config;
use report_sync::db::open_repository;
use report_sync::routes::create_app;
use report_sync::AppState;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration first; LOG_LEVEL feeds the tracing filter
    let loaded = Config::load();
    let filter = match &loaded {
        Ok(config) => config.log_filter(),
        Err(_) => Config::default().log_filter(),
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    info!("Starting server...");

    let config = loaded.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });
    info!("Environment: {}", config.environment);

    if config.auth_jwt_secret.is_none() {
        warn!("No AUTH_JWT_SECRET configured - every authenticated route will answer 500");
    }

    let repo = open_repository(&config).await;

    let state = Arc::new(AppState::new(config.clone(), repo));
    let flusher = state.activity.spawn_flusher(config.log_flush_interval());

    let app_routes = create_app(state.clone());

    let listener = match tokio::net::TcpListener::bind(config.server_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", config.server_address(), e);
            return;
        }
    };

    info!("🚀 Server running on http://{}", config.server_address());
    info!("📡 WebSocket available at ws://{}/report/{{report_id}}/section/{{section_id}}", config.server_address());
    info!("📚 Swagger UI available at http://{}/swagger", config.server_address());

    if let Err(e) = axum::serve(listener, app_routes)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    flusher.abort();
    let flushed = state.activity.flush_all().await;
    info!("Flushed {} pending activity entries, shutting down", flushed);
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
