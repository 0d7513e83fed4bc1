use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set, prelude::Expr,
    sea_query::OnConflict,
};

use crate::db::entities::refresh_token;

// --- Refresh Token Service Functions ---

/// Stores `token` as the user's refresh token, replacing any previous one and
/// clearing a prior revocation.
pub async fn upsert_refresh_token(
    db: &DatabaseConnection,
    user_id: i32,
    token: &str,
    expires_at: DateTime<Utc>,
) -> Result<(), DbErr> {
    let row = refresh_token::ActiveModel {
        token: Set(token.to_owned()),
        user_id: Set(user_id),
        created_at: Set(Utc::now()),
        expires_at: Set(expires_at),
        deleted: Set(false),
        ..Default::default()
    };

    refresh_token::Entity::insert(row)
        .on_conflict(
            OnConflict::column(refresh_token::Column::UserId)
                .update_columns([
                    refresh_token::Column::Token,
                    refresh_token::Column::CreatedAt,
                    refresh_token::Column::ExpiresAt,
                    refresh_token::Column::Deleted,
                ])
                .to_owned(),
        )
        .exec(db)
        .await?;
    Ok(())
}

/// Retrieves the user's refresh token row, revoked or not.
pub async fn get_refresh_token_for_user(
    db: &DatabaseConnection,
    user_id: i32,
) -> Result<Option<refresh_token::Model>, DbErr> {
    refresh_token::Entity::find()
        .filter(refresh_token::Column::UserId.eq(user_id))
        .one(db)
        .await
}

/// Marks the user's refresh token as deleted. Returns the number of rows touched.
pub async fn revoke_refresh_token(db: &DatabaseConnection, user_id: i32) -> Result<u64, DbErr> {
    let result = refresh_token::Entity::update_many()
        .col_expr(refresh_token::Column::Deleted, Expr::value(true))
        .filter(refresh_token::Column::UserId.eq(user_id))
        .filter(refresh_token::Column::Deleted.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
