use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error};

use crate::models::Identity;
use crate::services::auth_service::{get_auth_token, validate_jwt};
use crate::AppState;

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Get the auth token from the request
    let token = match get_auth_token(&req) {
        Ok(token) => token,
        Err(e) => {
            debug!("Rejecting unauthenticated request to {}: {}", req.uri().path(), e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 2. Validate the token
    let secret = match &state.config.auth_jwt_secret {
        Some(secret) => secret,
        None => {
            error!("Auth JWT secret not configured");
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };
    let token_data = match validate_jwt(&token, secret) {
        Ok(token_data) => token_data,
        Err(e) => {
            error!("JWT validation failed: {}", e);
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    // 3. Hand the identity to downstream handlers
    let identity = Identity::from(token_data.claims);
    debug!("Authenticated {}", identity.uid);
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
