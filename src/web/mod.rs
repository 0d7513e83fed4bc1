use axum::{
    Json, Router,
    extract::State,
    http::Method,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::server::config::ServerConfig;
use crate::services::auth_service::{self, TokenSettings};
use crate::services::container_service::ContainerService;
use crate::services::encryption_service::SecretBox;
use crate::web::{
    middleware::auth,
    models::{LoginRequest, RefreshRequest, RegisterRequest, TokenResponse, UserResponse},
    routes::*,
};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

pub use error::AppError;

pub const AUTH_COOKIE: &str = "token";

pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
    pub tokens: TokenSettings,
    /// Seals SSH keys before they are stored.
    pub secrets: SecretBox,
    pub container_service: Arc<ContainerService>,
}

async fn register_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user = auth_service::register_user(&app_state.db_pool, payload).await?;
    Ok(Json(user))
}

async fn login_handler(
    State(app_state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let login_response =
        auth_service::login_user(&app_state.db_pool, payload, &app_state.tokens).await?;

    let auth_cookie = Cookie::build((AUTH_COOKIE, login_response.access_token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(true)
        .build();

    Ok((jar.add(auth_cookie), Json(login_response)))
}

async fn refresh_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let tokens = auth_service::refresh_access_token(
        &app_state.db_pool,
        &payload.refresh_token,
        &app_state.tokens,
    )
    .await?;
    Ok(Json(tokens))
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let auth_layer = || axum_middleware::from_fn_with_state(app_state.clone(), auth::auth);

    Router::new()
        .route("/api/health", get(health_check_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route("/api/auth/refresh", post(refresh_handler))
        .nest(
            "/api/auth",
            user_routes::create_user_router().route_layer(auth_layer()),
        )
        .nest(
            "/api/servers",
            server_routes::create_server_router()
                .merge(container_routes::create_container_router())
                .route_layer(auth_layer()),
        )
        .with_state(app_state.clone())
        .layer(cors)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::cache::{ContainerListingCache, DEFAULT_TTL, MemoryCacheStore};
    use crate::db::memory_store::MemoryContainerStore;
    use crate::docker::DockerClient;
    use crate::docker::testing::ScriptedExecutor;

    pub const SECRET: &str = "router-test-secret";
    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    /// State over a disconnected database: enough for routing, auth and
    /// validation paths that never reach a query.
    pub fn app_state() -> Arc<AppState> {
        let config = ServerConfig {
            database_url: "postgres://unused".to_string(),
            jwt_secret: SECRET.to_string(),
            bind_address: "127.0.0.1:0".to_string(),
            redis_url: None,
            cache_ttl_secs: 300,
            access_token_minutes: 30,
            refresh_token_days: 7,
            ssh_key_encryption_key: KEY.to_string(),
            log_dir: "logs".to_string(),
            ssh_connect_timeout_secs: 10,
            ssh_command_timeout_secs: 120,
            ssh_verify_host_key: true,
            ssh_known_hosts_file: None,
            ssh_binary: "ssh".to_string(),
        };
        let secrets = SecretBox::from_hex_key(KEY).unwrap();
        let container_service = ContainerService::new(
            Arc::new(MemoryContainerStore::new()),
            DockerClient::new(Arc::new(ScriptedExecutor::new())),
            ContainerListingCache::new(Arc::new(MemoryCacheStore::new()), DEFAULT_TTL),
            secrets.clone(),
        );
        Arc::new(AppState {
            db_pool: DatabaseConnection::Disconnected,
            tokens: TokenSettings::from_config(&config),
            config: Arc::new(config),
            secrets,
            container_service: Arc::new(container_service),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{SECRET, app_state};
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use chrono::Utc;
    use tower::ServiceExt;

    use crate::db::entities::user;
    use crate::services::auth_service::{ACCESS_TOKEN, REFRESH_TOKEN, issue_token};

    fn token(token_type: &str) -> String {
        let now = Utc::now();
        let alice = user::Model {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted: false,
        };
        let settings = TokenSettings {
            secret: SECRET.to_string(),
            access_ttl: chrono::Duration::minutes(5),
            refresh_ttl: chrono::Duration::days(1),
        };
        issue_token(&alice, token_type, &settings).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = create_axum_router(app_state());
        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_container_routes_require_auth() {
        let app = create_axum_router(app_state());
        let response = app
            .oneshot(
                Request::get("/api/servers/1/containers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error"], "Invalid credentials");
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_accepted_as_bearer() {
        let app = create_axum_router(app_state());
        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token(REFRESH_TOKEN)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_me_with_cookie_token() {
        let app = create_axum_router(app_state());
        let response = app
            .oneshot(
                Request::get("/api/auth/me")
                    .header(header::COOKIE, format!("{AUTH_COOKIE}={}", token(ACCESS_TOKEN)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["username"], "alice");
    }

    #[tokio::test]
    async fn test_register_validation_runs_before_database() {
        let app = create_axum_router(app_state());
        let response = app
            .oneshot(
                Request::post("/api/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        r#"{"username":"al","email":"al@example.com","password":"password1"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_container_action_is_not_found() {
        let app = create_axum_router(app_state());
        let response = app
            .oneshot(
                Request::post("/api/servers/1/containers/2/pause")
                    .header(header::AUTHORIZATION, format!("Bearer {}", token(ACCESS_TOKEN)))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
