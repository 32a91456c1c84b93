//! Streak repository.

use std::sync::Arc;

use crate::entities::{Streak, streak};
use chrono::{NaiveDate, Utc};
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, sea_query::Expr,
    sea_query::OnConflict,
};

/// Streak repository for database operations.
#[derive(Clone)]
pub struct StreakRepository {
    db: Arc<DatabaseConnection>,
}

impl StreakRepository {
    /// Create a new streak repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the streak of a user.
    pub async fn find(&self, user_id: &str) -> AppResult<Option<streak::Model>> {
        Streak::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or overwrite a streak row.
    pub async fn upsert(&self, model: streak::ActiveModel) -> AppResult<()> {
        Streak::insert(model)
            .on_conflict(
                OnConflict::column(streak::Column::UserId)
                    .update_columns([
                        streak::Column::CurrentStreak,
                        streak::Column::LongestStreak,
                        streak::Column::LastActiveDate,
                        streak::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Zero every running streak last active before `cutoff`.
    ///
    /// Returns the number of streaks reset.
    pub async fn reset_inactive_before(&self, cutoff: NaiveDate) -> AppResult<u64> {
        let result = Streak::update_many()
            .col_expr(streak::Column::CurrentStreak, Expr::value(0))
            .col_expr(
                streak::Column::UpdatedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(streak::Column::LastActiveDate.lt(cutoff))
            .filter(streak::Column::CurrentStreak.gt(0))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn test_find() {
        let row = streak::Model {
            user_id: "u1".to_string(),
            current_streak: 4,
            longest_streak: 9,
            last_active_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            updated_at: Utc::now().fixed_offset(),
        };
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row]])
                .into_connection(),
        );

        let repo = StreakRepository::new(db);
        let found = repo.find("u1").await.unwrap().unwrap();
        assert_eq!(found.current_streak, 4);
        assert_eq!(found.longest_streak, 9);
    }

    #[tokio::test]
    async fn test_reset_inactive_before_reports_rows() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 7,
                }])
                .into_connection(),
        );

        let repo = StreakRepository::new(db);
        let cutoff = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(repo.reset_inactive_before(cutoff).await.unwrap(), 7);
    }
}
