use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set, SqlErr,
};
use thiserror::Error;

use crate::db::entities::container;

const NAME_INDEX: &str = "uq_server_container_name";
const DOCKER_ID_INDEX: &str = "uq_server_docker";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unique constraint violation for fields: {}", .fields.join(", "))]
    UniqueViolation { fields: Vec<String> },
    #[error("Database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn unique(fields: &[&str]) -> Self {
        StoreError::UniqueViolation {
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}

impl From<DbErr> for StoreError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => {
                StoreError::UniqueViolation {
                    fields: unique_fields_for(&message),
                }
            }
            _ => StoreError::Database(err.to_string()),
        }
    }
}

/// Maps a violated index back to the column set it guards.
fn unique_fields_for(message: &str) -> Vec<String> {
    let fields: &[&str] = if message.contains(DOCKER_ID_INDEX) {
        &["server_id", "docker_id"]
    } else if message.contains(NAME_INDEX) {
        &["server_id", "name"]
    } else {
        &["unknown"]
    };
    fields.iter().map(|f| f.to_string()).collect()
}

/// Fields for a container row about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContainer {
    pub server_id: i32,
    pub name: String,
    pub docker_id: Option<String>,
    pub status: Option<String>,
    pub image: String,
    pub ports: Option<String>,
    pub is_active: bool,
}

/// Partial update. `None` leaves the column as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerChanges {
    pub status: Option<String>,
    pub image: Option<String>,
    pub ports: Option<Option<String>>,
    pub is_active: Option<bool>,
}

impl ContainerChanges {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.image.is_none()
            && self.ports.is_none()
            && self.is_active.is_none()
    }
}

/// Persistence gateway for container records. Every read excludes
/// soft-deleted rows.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    async fn create(&self, new: NewContainer) -> Result<container::Model, StoreError>;

    async fn get_by_id(&self, id: i32) -> Result<Option<container::Model>, StoreError>;

    async fn get_all_by_server(&self, server_id: i32)
    -> Result<Vec<container::Model>, StoreError>;

    async fn find_by_name(
        &self,
        server_id: i32,
        name: &str,
    ) -> Result<Option<container::Model>, StoreError>;

    async fn update(
        &self,
        id: i32,
        changes: ContainerChanges,
    ) -> Result<Option<container::Model>, StoreError>;

    async fn soft_delete(&self, id: i32) -> Result<Option<container::Model>, StoreError>;
}

#[derive(Clone)]
pub struct SeaOrmContainerStore {
    db: DatabaseConnection,
}

impl SeaOrmContainerStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ContainerStore for SeaOrmContainerStore {
    async fn create(&self, new: NewContainer) -> Result<container::Model, StoreError> {
        let now = Utc::now();
        let model = container::ActiveModel {
            name: Set(new.name),
            docker_id: Set(new.docker_id),
            status: Set(new.status),
            image: Set(new.image),
            ports: Set(new.ports),
            is_active: Set(new.is_active),
            server_id: Set(new.server_id),
            created_at: Set(now),
            updated_at: Set(now),
            deleted: Set(false),
            ..Default::default() // id is assigned by the database
        };
        Ok(model.insert(&self.db).await?)
    }

    async fn get_by_id(&self, id: i32) -> Result<Option<container::Model>, StoreError> {
        Ok(container::Entity::find_by_id(id)
            .filter(container::Column::Deleted.eq(false))
            .one(&self.db)
            .await?)
    }

    async fn get_all_by_server(
        &self,
        server_id: i32,
    ) -> Result<Vec<container::Model>, StoreError> {
        Ok(container::Entity::find()
            .filter(container::Column::ServerId.eq(server_id))
            .filter(container::Column::Deleted.eq(false))
            .order_by_asc(container::Column::Id)
            .all(&self.db)
            .await?)
    }

    async fn find_by_name(
        &self,
        server_id: i32,
        name: &str,
    ) -> Result<Option<container::Model>, StoreError> {
        Ok(container::Entity::find()
            .filter(container::Column::ServerId.eq(server_id))
            .filter(container::Column::Name.eq(name))
            .filter(container::Column::Deleted.eq(false))
            .one(&self.db)
            .await?)
    }

    async fn update(
        &self,
        id: i32,
        changes: ContainerChanges,
    ) -> Result<Option<container::Model>, StoreError> {
        let Some(existing) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: container::ActiveModel = existing.into();
        if let Some(status) = changes.status {
            active.status = Set(Some(status));
        }
        if let Some(image) = changes.image {
            active.image = Set(image);
        }
        if let Some(ports) = changes.ports {
            active.ports = Set(ports);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(Some(active.update(&self.db).await?))
    }

    async fn soft_delete(&self, id: i32) -> Result<Option<container::Model>, StoreError> {
        let Some(existing) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let mut active: container::ActiveModel = existing.into();
        active.deleted = Set(true);
        active.updated_at = Set(Utc::now());

        Ok(Some(active.update(&self.db).await?))
    }
}
