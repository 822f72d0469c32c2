//! Middleware for the REST API server.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

/// Create CORS middleware.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Request logging middleware.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );

    response
}

/// API key authentication, active when `FINPULSE_REQUIRE_AUTH` is set.
///
/// Accepts `Authorization: Bearer <key>` or `Token <key>` matching `FINPULSE_API_KEY`.
/// `/health` is always open.
pub async fn auth_middleware(request: Request, next: Next) -> Result<Response, StatusCode> {
    if std::env::var("FINPULSE_REQUIRE_AUTH").is_err() || request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let expected_key = std::env::var("FINPULSE_API_KEY").unwrap_or_default();
    if expected_key.is_empty() {
        warn!("FINPULSE_REQUIRE_AUTH is set but FINPULSE_API_KEY is empty; rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = request
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("Token ")));

    match token {
        Some(token) if token == expected_key => Ok(next.run(request).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}
