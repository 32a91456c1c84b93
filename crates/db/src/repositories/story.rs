//! Story repository.

use std::sync::Arc;

use crate::entities::{Story, story};
use chrono::{DateTime, Utc};
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// Story repository for database operations.
#[derive(Clone)]
pub struct StoryRepository {
    db: Arc<DatabaseConnection>,
}

impl StoryRepository {
    /// Create a new story repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a story by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<story::Model>> {
        Story::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the story attached to an activity.
    pub async fn find_by_activity(
        &self,
        user_id: &str,
        activity_id: &str,
    ) -> AppResult<Option<story::Model>> {
        Story::find()
            .filter(story::Column::UserId.eq(user_id))
            .filter(story::Column::ActivityId.eq(activity_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Unexpired stories of a user, newest first.
    pub async fn find_live_by_user(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<story::Model>> {
        Story::find()
            .filter(story::Column::UserId.eq(user_id))
            .filter(story::Column::ExpiresAt.gt(now.fixed_offset()))
            .order_by_desc(story::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Expired stories, oldest first, one batch at a time.
    pub async fn find_expired(&self, now: DateTime<Utc>, limit: u64) -> AppResult<Vec<story::Model>> {
        Story::find()
            .filter(story::Column::ExpiresAt.lte(now.fixed_offset()))
            .order_by_asc(story::Column::ExpiresAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a story.
    pub async fn create(&self, model: story::ActiveModel) -> AppResult<story::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| super::write_error(e, "Story already exists"))
    }

    /// Update a story.
    pub async fn update(&self, model: story::ActiveModel) -> AppResult<story::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a story by ID.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        Story::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_story(id: &str, expires_in_hours: i64) -> story::Model {
        let now = Utc::now();
        story::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            activity_id: "a1".to_string(),
            activity_name: "Run".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            storage_key: format!("stories/u1/{id}.jpg"),
            thumbnail_key: format!("stories/u1/{id}_thumb.jpg"),
            url: format!("/files/stories/u1/{id}.jpg"),
            thumbnail_url: format!("/files/stories/u1/{id}_thumb.jpg"),
            content_type: "image/jpeg".to_string(),
            width: 640,
            height: 480,
            size: 1024,
            created_at: now.fixed_offset(),
            expires_at: (now + Duration::hours(expires_in_hours)).fixed_offset(),
        }
    }

    #[tokio::test]
    async fn test_find_by_activity() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_story("s1", 24)]])
                .into_connection(),
        );

        let repo = StoryRepository::new(db);
        let found = repo.find_by_activity("u1", "a1").await.unwrap().unwrap();
        assert_eq!(found.thumbnail_key, "stories/u1/s1_thumb.jpg");
    }

    #[tokio::test]
    async fn test_find_expired() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_story("s1", -1), create_test_story("s2", -2)]])
                .into_connection(),
        );

        let repo = StoryRepository::new(db);
        let expired = repo.find_expired(Utc::now(), 100).await.unwrap();
        assert_eq!(expired.len(), 2);
    }
}
