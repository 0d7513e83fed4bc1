use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::services::auth_service::{ACCESS_TOKEN, decode_token};
use crate::web::models::AuthenticatedUser;
use crate::web::{AUTH_COOKIE, AppState, error::AppError};

/// Accepts an access token from the `Authorization: Bearer` header or, failing
/// that, the auth cookie.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .map(|s| s.to_string())
        .or_else(|| jar.get(AUTH_COOKIE).map(|c| c.value().to_string()))
        .ok_or(AppError::InvalidCredentials)?;

    let claims = decode_token(&token, ACCESS_TOKEN, &state.tokens.secret)?;

    let authenticated_user = AuthenticatedUser {
        id: claims.user_id,
        username: claims.sub,
    };
    req.extensions_mut().insert(authenticated_user);
    Ok(next.run(req).await)
}
