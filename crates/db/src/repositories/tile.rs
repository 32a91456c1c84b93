//! Custom tile and tile layout repository.

use std::sync::Arc;

use crate::entities::{CustomTile, TileLayout, custom_tile, tile_layout};
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, sea_query::OnConflict,
};

/// Tile repository for database operations.
#[derive(Clone)]
pub struct TileRepository {
    db: Arc<DatabaseConnection>,
}

impl TileRepository {
    /// Create a new tile repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a custom tile by ID.
    pub async fn find_custom_by_id(&self, id: &str) -> AppResult<Option<custom_tile::Model>> {
        CustomTile::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All custom tiles of a user, oldest first.
    pub async fn find_custom_by_user(&self, user_id: &str) -> AppResult<Vec<custom_tile::Model>> {
        CustomTile::find()
            .filter(custom_tile::Column::UserId.eq(user_id))
            .order_by_asc(custom_tile::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count custom tiles of a user.
    pub async fn count_custom_by_user(&self, user_id: &str) -> AppResult<u64> {
        CustomTile::find()
            .filter(custom_tile::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user's custom tile by lowercased name.
    pub async fn find_custom_by_name(
        &self,
        user_id: &str,
        name_lower: &str,
    ) -> AppResult<Option<custom_tile::Model>> {
        CustomTile::find()
            .filter(custom_tile::Column::UserId.eq(user_id))
            .filter(custom_tile::Column::NameLower.eq(name_lower))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a custom tile.
    pub async fn create_custom(
        &self,
        model: custom_tile::ActiveModel,
    ) -> AppResult<custom_tile::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| super::write_error(e, "Tile already exists"))
    }

    /// Update a custom tile.
    pub async fn update_custom(
        &self,
        model: custom_tile::ActiveModel,
    ) -> AppResult<custom_tile::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| super::write_error(e, "Tile name already used"))
    }

    /// Delete a custom tile.
    pub async fn delete_custom(&self, model: custom_tile::Model) -> AppResult<()> {
        model
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find the stored layout of a user.
    pub async fn find_layout(&self, user_id: &str) -> AppResult<Option<tile_layout::Model>> {
        TileLayout::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or replace the layout of a user.
    pub async fn upsert_layout(&self, model: tile_layout::ActiveModel) -> AppResult<()> {
        TileLayout::insert(model)
            .on_conflict(
                OnConflict::column(tile_layout::Column::UserId)
                    .update_columns([
                        tile_layout::Column::Entries,
                        tile_layout::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
