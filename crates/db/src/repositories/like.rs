//! Summary like repository.

use std::sync::Arc;

use crate::entities::{SummaryLike, summary_like};
use chrono::NaiveDate;
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Like repository for database operations.
#[derive(Clone)]
pub struct LikeRepository {
    db: Arc<DatabaseConnection>,
}

impl LikeRepository {
    /// Create a new like repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the like of `liker_id` on a summary.
    pub async fn find(
        &self,
        liker_id: &str,
        liked_user_id: &str,
        date: NaiveDate,
    ) -> AppResult<Option<summary_like::Model>> {
        SummaryLike::find()
            .filter(summary_like::Column::LikerId.eq(liker_id))
            .filter(summary_like::Column::LikedUserId.eq(liked_user_id))
            .filter(summary_like::Column::Date.eq(date))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a like. A concurrent duplicate surfaces as `Conflict`.
    pub async fn create(&self, model: summary_like::ActiveModel) -> AppResult<summary_like::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| super::write_error(e, "Already liked"))
    }

    /// Update a like.
    pub async fn update(&self, model: summary_like::ActiveModel) -> AppResult<summary_like::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a like.
    pub async fn delete(&self, model: summary_like::Model) -> AppResult<()> {
        model
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Count likes on a summary.
    pub async fn count(&self, liked_user_id: &str, date: NaiveDate) -> AppResult<u64> {
        SummaryLike::find()
            .filter(summary_like::Column::LikedUserId.eq(liked_user_id))
            .filter(summary_like::Column::Date.eq(date))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Likes on a summary, newest first.
    pub async fn find_by_summary(
        &self,
        liked_user_id: &str,
        date: NaiveDate,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<summary_like::Model>> {
        let mut query = SummaryLike::find()
            .filter(summary_like::Column::LikedUserId.eq(liked_user_id))
            .filter(summary_like::Column::Date.eq(date))
            .order_by_desc(summary_like::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(summary_like::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, Set};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn active(id: &str) -> summary_like::ActiveModel {
        summary_like::ActiveModel {
            id: Set(id.to_string()),
            liker_id: Set("a".to_string()),
            liked_user_id: Set("b".to_string()),
            date: Set(day()),
            reaction: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        }
    }

    #[tokio::test]
    async fn test_failed_insert_is_database_error() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );

        let repo = LikeRepository::new(db);
        let result = repo.create(active("l1")).await;
        assert!(matches!(result, Err(AppError::Database(_))));
    }

    #[tokio::test]
    async fn test_count() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(2))
                }]])
                .into_connection(),
        );

        let repo = LikeRepository::new(db);
        assert_eq!(repo.count("b", day()).await.unwrap(), 2);
    }
}
