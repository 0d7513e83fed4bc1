use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A container mirrored from a managed server.
///
/// `name` and `docker_id` are unique per server among non-deleted rows
/// (`uq_server_container_name`, `uq_server_docker`).
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "containers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    /// Short (12 character) engine id. Null until the remote create succeeds.
    pub docker_id: Option<String>,
    pub status: Option<String>,
    pub image: String,
    pub ports: Option<String>,
    pub is_active: bool,
    pub server_id: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
    #[serde(skip_serializing, default)]
    pub deleted: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::server::Entity",
        from = "Column::ServerId",
        to = "super::server::Column::Id",
        on_delete = "Cascade",
        on_update = "Cascade"
    )]
    Server,
}

impl Related<super::server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
