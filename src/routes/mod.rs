pub mod api;
pub mod auth_middleware;

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::{middleware, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::websocket::handler::websocket_handler;
use crate::AppState;

pub use api::create_api_routes;

/// Build the full application router.
pub fn create_app(state: Arc<AppState>) -> Router {
    let ws_routes = Router::<Arc<AppState>>::new()
        .route("/report/:report_id/section/:section_id", get(websocket_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware::auth_middleware))
        .with_state(state.clone());

    let mut app = Router::new()
        // Mount API routes
        .nest("/api", create_api_routes(state.clone()))
        .merge(ws_routes)
        // Mount Swagger UI
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    let origins: Vec<HeaderValue> = state
        .config
        .cors_origin_list()
        .into_iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();
    if !origins.is_empty() {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
                .allow_credentials(true),
        );
    }

    app
}
