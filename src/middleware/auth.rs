use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::AppError;
use crate::models::CurrentUser;
use crate::services::AuthService;
use crate::AppState;

/// Name of the cookie the portal stores its session JWT in
pub const TOKEN_COOKIE: &str = "token";

/// Authentication middleware
/// Takes the JWT from the `token` cookie, else the Authorization header
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_token(&request)
        .ok_or_else(|| AppError::Unauthorized("No autenticado (falta token)".to_string()))?;

    let claims = AuthService::validate_token(&token, &state.config)?;

    let id_usuario = claims
        .user_id()
        .ok_or_else(|| AppError::Unauthorized("Token sin id_usuario".to_string()))?;

    let current_user = CurrentUser {
        id_usuario,
        correo: claims.correo,
    };

    tracing::debug!(
        "Authenticated user {} ({})",
        current_user.id_usuario,
        current_user.correo.as_deref().unwrap_or("-")
    );
    request.extensions_mut().insert(current_user);

    Ok(next.run(request).await)
}

fn extract_token(request: &Request) -> Option<String> {
    let cookie = CookieJar::from_headers(request.headers())
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty());

    cookie.or_else(|| {
        request
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    })
}
