use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
};
use std::sync::Arc;
use tracing::info;

use crate::db::entities::server;
use crate::db::services::{self, ServerChanges, ServerInput};
use crate::ssh::check_destination_part;
use crate::web::models::{
    AuthenticatedUser, CreateServerRequest, ServerResponse, UpdateServerRequest,
};
use crate::web::{AppError, AppState};

pub fn create_server_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_servers_handler).post(create_server_handler))
        .route(
            "/{server_id}",
            get(get_server_handler)
                .put(update_server_handler)
                .delete(delete_server_handler),
        )
}

/// Loads a live server owned by `owner_id`. Missing, deleted and foreign
/// servers are indistinguishable to the caller.
pub(crate) async fn owned_server(
    app_state: &AppState,
    server_id: i32,
    owner_id: i32,
) -> Result<server::Model, AppError> {
    services::get_server_for_owner(&app_state.db_pool, server_id, owner_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Server not found.".to_string()))
}

fn validate_port(port: i32) -> Result<i32, AppError> {
    if (1..=65535).contains(&port) {
        Ok(port)
    } else {
        Err(AppError::InvalidInput(format!("Invalid SSH port: {port}")))
    }
}

fn required(field: &str, value: String) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{field} must not be empty.")));
    }
    Ok(trimmed.to_string())
}

/// A required field that ends up in the ssh destination (`user@host`).
fn destination(field: &str, value: String) -> Result<String, AppError> {
    let value = required(field, value)?;
    check_destination_part(field, &value).map_err(AppError::InvalidInput)?;
    Ok(value)
}

fn seal_key(app_state: &AppState, key: &str) -> Result<String, AppError> {
    if key.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "ssh_private_key must not be empty.".to_string(),
        ));
    }
    app_state
        .secrets
        .seal(key)
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

async fn list_servers_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<Vec<ServerResponse>>, AppError> {
    let servers = services::get_servers_by_owner(&app_state.db_pool, authenticated_user.id).await?;
    Ok(Json(servers.into_iter().map(ServerResponse::from).collect()))
}

async fn create_server_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<CreateServerRequest>,
) -> Result<(StatusCode, Json<ServerResponse>), AppError> {
    let input = ServerInput {
        name: required("name", payload.name)?,
        host: destination("host", payload.host)?,
        port: validate_port(payload.port)?,
        ssh_user: destination("ssh_user", payload.ssh_user)?,
        ssh_private_key: seal_key(&app_state, &payload.ssh_private_key)?,
        description: payload.description,
    };

    let created = services::create_server(&app_state.db_pool, authenticated_user.id, input).await?;
    info!(server_id = created.id, owner_id = authenticated_user.id, "Server registered.");
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn get_server_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(server_id): Path<i32>,
) -> Result<Json<ServerResponse>, AppError> {
    let server = owned_server(&app_state, server_id, authenticated_user.id).await?;
    Ok(Json(server.into()))
}

async fn update_server_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(server_id): Path<i32>,
    Json(payload): Json<UpdateServerRequest>,
) -> Result<Json<ServerResponse>, AppError> {
    let existing = owned_server(&app_state, server_id, authenticated_user.id).await?;

    let changes = ServerChanges {
        name: payload.name.map(|v| required("name", v)).transpose()?,
        host: payload.host.map(|v| destination("host", v)).transpose()?,
        port: payload.port.map(validate_port).transpose()?,
        ssh_user: payload.ssh_user.map(|v| destination("ssh_user", v)).transpose()?,
        ssh_private_key: payload
            .ssh_private_key
            .map(|key| seal_key(&app_state, &key))
            .transpose()?,
        description: payload.description,
    };

    let updated = services::update_server(&app_state.db_pool, existing, changes).await?;
    // Connection details may have changed; drop the listing fetched through the old ones.
    app_state.container_service.cache().invalidate(server_id).await;
    Ok(Json(updated.into()))
}

async fn delete_server_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(server_id): Path<i32>,
) -> Result<Json<ServerResponse>, AppError> {
    owned_server(&app_state, server_id, authenticated_user.id).await?;

    let deleted = services::soft_delete_server(&app_state.db_pool, server_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Server not found.".to_string()))?;
    app_state.container_service.cache().invalidate(server_id).await;

    info!(server_id, owner_id = authenticated_user.id, "Server deleted.");
    Ok(Json(deleted.into()))
}
