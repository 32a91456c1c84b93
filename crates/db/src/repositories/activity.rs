//! Activity repository.

use std::sync::Arc;

use crate::entities::{Activity, activity};
use chrono::NaiveDate;
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};

/// Activity repository for database operations.
#[derive(Clone)]
pub struct ActivityRepository {
    db: Arc<DatabaseConnection>,
}

impl ActivityRepository {
    /// Create a new activity repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an activity by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<activity::Model>> {
        Activity::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All activities of a user on one day, by name.
    pub async fn find_by_user_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> AppResult<Vec<activity::Model>> {
        Activity::find()
            .filter(activity::Column::UserId.eq(user_id))
            .filter(activity::Column::Date.eq(date))
            .order_by_asc(activity::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Activities of a user within an inclusive date range.
    pub async fn find_by_user_range(
        &self,
        user_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<activity::Model>> {
        Activity::find()
            .filter(activity::Column::UserId.eq(user_id))
            .filter(activity::Column::Date.gte(from))
            .filter(activity::Column::Date.lte(to))
            .order_by_asc(activity::Column::Date)
            .order_by_asc(activity::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether a user logged anything on a day.
    pub async fn exists_on(&self, user_id: &str, date: NaiveDate) -> AppResult<bool> {
        let count = Activity::find()
            .filter(activity::Column::UserId.eq(user_id))
            .filter(activity::Column::Date.eq(date))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Create a new activity.
    pub async fn create(&self, model: activity::ActiveModel) -> AppResult<activity::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            super::write_error(e, "Activity already logged for this day")
        })
    }

    /// Update an activity.
    pub async fn update(&self, model: activity::ActiveModel) -> AppResult<activity::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an activity.
    pub async fn delete(&self, model: activity::Model) -> AppResult<()> {
        model
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_activity(id: &str, name: &str, hours: f64) -> activity::Model {
        activity::Model {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            tile_id: Some("work".to_string()),
            duration_hours: hours,
            note: None,
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_find_by_user_date() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[
                    create_test_activity("a1", "Deep work", 6.0),
                    create_test_activity("a2", "Gym", 1.5),
                ]])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let rows = repo.find_by_user_date("u1", day).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].duration_hours, 1.5);
    }

    #[tokio::test]
    async fn test_exists_on() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(0))
                }]])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert!(!repo.exists_on("u1", day).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }])
                .into_connection(),
        );

        let repo = ActivityRepository::new(db);
        repo.delete(create_test_activity("a1", "Gym", 1.0))
            .await
            .unwrap();
    }
}
