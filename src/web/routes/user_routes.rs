use axum::{
    Json, Router,
    extract::{Extension, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;

use crate::services::auth_service;
use crate::web::{AUTH_COOKIE, AppError, AppState, models::AuthenticatedUser};

pub fn create_user_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/me", get(me))
        .route("/logout", post(logout))
}

async fn me(Extension(auth_user): Extension<AuthenticatedUser>) -> impl IntoResponse {
    Json(serde_json::json!({
        "id": auth_user.id,
        "username": auth_user.username,
    }))
}

/// Revokes the stored refresh token and clears the auth cookie. The access
/// token stays valid until it expires.
async fn logout(
    Extension(auth_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    auth_service::logout_user(&app_state.db_pool, auth_user.id).await?;
    Ok((
        StatusCode::NO_CONTENT,
        jar.remove(Cookie::build(AUTH_COOKIE).path("/")),
    ))
}
