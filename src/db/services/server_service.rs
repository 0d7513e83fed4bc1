use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionError, TransactionTrait, prelude::Expr,
};

use crate::db::entities::{container, server};

// --- Server Service Functions ---

/// Fields for a new server. `ssh_private_key` must already be encrypted.
#[derive(Debug, Clone)]
pub struct ServerInput {
    pub name: String,
    pub host: String,
    pub port: i32,
    pub ssh_user: String,
    pub ssh_private_key: String,
    pub description: Option<String>,
}

/// Partial update. `None` leaves the column as it is.
#[derive(Debug, Clone, Default)]
pub struct ServerChanges {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<i32>,
    pub ssh_user: Option<String>,
    pub ssh_private_key: Option<String>,
    pub description: Option<String>,
}

/// Creates a server owned by `owner_id`.
pub async fn create_server(
    db: &DatabaseConnection,
    owner_id: i32,
    input: ServerInput,
) -> Result<server::Model, DbErr> {
    let now = Utc::now();
    let new_server = server::ActiveModel {
        name: Set(input.name),
        host: Set(input.host),
        port: Set(input.port),
        ssh_user: Set(input.ssh_user),
        ssh_private_key: Set(input.ssh_private_key),
        description: Set(input.description),
        owner_id: Set(owner_id),
        created_at: Set(now),
        updated_at: Set(now),
        deleted: Set(false),
        ..Default::default()
    };
    new_server.insert(db).await
}

/// Retrieves a non-deleted server, but only if `owner_id` owns it.
pub async fn get_server_for_owner(
    db: &DatabaseConnection,
    server_id: i32,
    owner_id: i32,
) -> Result<Option<server::Model>, DbErr> {
    server::Entity::find_by_id(server_id)
        .filter(server::Column::OwnerId.eq(owner_id))
        .filter(server::Column::Deleted.eq(false))
        .one(db)
        .await
}

/// Retrieves all non-deleted servers for a given user.
pub async fn get_servers_by_owner(
    db: &DatabaseConnection,
    owner_id: i32,
) -> Result<Vec<server::Model>, DbErr> {
    server::Entity::find()
        .filter(server::Column::OwnerId.eq(owner_id))
        .filter(server::Column::Deleted.eq(false))
        .order_by_asc(server::Column::Id)
        .all(db)
        .await
}

/// Applies a partial update to a server the caller already loaded.
pub async fn update_server(
    db: &DatabaseConnection,
    existing: server::Model,
    changes: ServerChanges,
) -> Result<server::Model, DbErr> {
    let mut active: server::ActiveModel = existing.into();
    if let Some(name) = changes.name {
        active.name = Set(name);
    }
    if let Some(host) = changes.host {
        active.host = Set(host);
    }
    if let Some(port) = changes.port {
        active.port = Set(port);
    }
    if let Some(ssh_user) = changes.ssh_user {
        active.ssh_user = Set(ssh_user);
    }
    if let Some(ssh_private_key) = changes.ssh_private_key {
        active.ssh_private_key = Set(ssh_private_key);
    }
    if let Some(description) = changes.description {
        active.description = Set(Some(description));
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await
}

/// Soft-deletes a server and, in the same transaction, every container it owns.
/// No live container may reference a deleted server.
pub async fn soft_delete_server(
    db: &DatabaseConnection,
    server_id: i32,
) -> Result<Option<server::Model>, TransactionError<DbErr>> {
    db.transaction::<_, Option<server::Model>, DbErr>(|txn| {
        Box::pin(async move {
            let Some(existing) = server::Entity::find_by_id(server_id)
                .filter(server::Column::Deleted.eq(false))
                .one(txn)
                .await?
            else {
                return Ok(None);
            };

            let now = Utc::now();
            let cascaded = container::Entity::update_many()
                .col_expr(container::Column::Deleted, Expr::value(true))
                .col_expr(container::Column::UpdatedAt, Expr::value(now))
                .filter(container::Column::ServerId.eq(server_id))
                .filter(container::Column::Deleted.eq(false))
                .exec(txn)
                .await?;
            tracing::debug!(
                server_id,
                containers = cascaded.rows_affected,
                "Cascaded soft delete to containers."
            );

            let mut active: server::ActiveModel = existing.into();
            active.deleted = Set(true);
            active.updated_at = Set(now);
            Ok(Some(active.update(txn).await?))
        })
    })
    .await
}
