use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;

use crate::db::entities::container;
use crate::docker::{ContainerAction, SyncReport};
use crate::web::models::{
    AuthenticatedUser, ContainerActionResponse, CreateContainerRequest, UpdateContainerRequest,
};
use crate::web::routes::server_routes::owned_server;
use crate::web::{AppError, AppState};

/// Mounted under `/api/servers`, next to the server routes.
pub fn create_container_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{server_id}/containers",
            get(list_containers_handler).post(create_container_handler),
        )
        .route("/{server_id}/containers/sync", post(sync_containers_handler))
        .route(
            "/{server_id}/containers/{container_id}",
            get(get_container_handler)
                .put(update_container_handler)
                .delete(delete_container_handler),
        )
        .route(
            "/{server_id}/containers/{container_id}/{action}",
            post(container_action_handler),
        )
}

async fn create_container_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(server_id): Path<i32>,
    Json(payload): Json<CreateContainerRequest>,
) -> Result<(StatusCode, Json<ContainerActionResponse>), AppError> {
    let server = owned_server(&app_state, server_id, authenticated_user.id).await?;
    let record = app_state
        .container_service
        .create(&server, payload.into())
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ContainerActionResponse::creating(record.id)),
    ))
}

async fn list_containers_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(server_id): Path<i32>,
) -> Result<Json<Vec<container::Model>>, AppError> {
    let server = owned_server(&app_state, server_id, authenticated_user.id).await?;
    Ok(Json(app_state.container_service.list(&server).await?))
}

async fn sync_containers_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path(server_id): Path<i32>,
) -> Result<Json<SyncReport>, AppError> {
    let server = owned_server(&app_state, server_id, authenticated_user.id).await?;
    Ok(Json(app_state.container_service.resync(&server).await?))
}

async fn get_container_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path((server_id, container_id)): Path<(i32, i32)>,
) -> Result<Json<container::Model>, AppError> {
    owned_server(&app_state, server_id, authenticated_user.id).await?;
    Ok(Json(
        app_state.container_service.get(server_id, container_id).await?,
    ))
}

async fn update_container_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path((server_id, container_id)): Path<(i32, i32)>,
    Json(payload): Json<UpdateContainerRequest>,
) -> Result<Json<container::Model>, AppError> {
    owned_server(&app_state, server_id, authenticated_user.id).await?;
    let updated = app_state
        .container_service
        .set_active(server_id, container_id, payload.is_active)
        .await?;
    Ok(Json(updated))
}

async fn delete_container_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path((server_id, container_id)): Path<(i32, i32)>,
) -> Result<Json<container::Model>, AppError> {
    let server = owned_server(&app_state, server_id, authenticated_user.id).await?;
    let removed = app_state
        .container_service
        .remove(&server, container_id)
        .await?;
    Ok(Json(removed))
}

async fn container_action_handler(
    Extension(authenticated_user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Path((server_id, container_id, action)): Path<(i32, i32, String)>,
) -> Result<Json<ContainerActionResponse>, AppError> {
    let action: ContainerAction = action.parse().map_err(AppError::NotFound)?;
    let server = owned_server(&app_state, server_id, authenticated_user.id).await?;
    app_state
        .container_service
        .control(&server, container_id, action)
        .await?;
    Ok(Json(ContainerActionResponse::for_action(container_id, action)))
}
