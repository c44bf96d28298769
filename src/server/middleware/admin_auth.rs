use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::server::app::AppState;

/// Gates admin endpoints behind `Authorization: Bearer <ADMIN_TOKEN>`.
/// Unlike a dashboard-facing auth layer that degrades gracefully when a
/// token is missing, admin routes require it: absent or mismatched tokens
/// are rejected outright rather than passed through as an anonymous user.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if token == state.config.admin_token => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}
