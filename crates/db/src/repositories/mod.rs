//! Database repositories.

mod activity;
mod cron_job_log;
mod follow;
mod like;
mod notification;
mod push_subscription;
mod story;
mod streak;
mod tile;
mod user;

pub use activity::ActivityRepository;
pub use cron_job_log::CronJobLogRepository;
pub use follow::{FollowRepository, Transition};
pub use like::LikeRepository;
pub use notification::{NotificationFilter, NotificationRepository};
pub use push_subscription::PushSubscriptionRepository;
pub use story::StoryRepository;
pub use streak::StreakRepository;
pub use tile::TileRepository;
pub use user::UserRepository;

use habitgrid_common::AppError;
use sea_orm::{DbErr, SqlErr};

/// Map a failed write, turning unique violations into `Conflict`.
fn write_error(err: DbErr, conflict: &str) -> AppError {
    classify_write_error(err.sql_err(), err, conflict)
}

fn classify_write_error(sql_err: Option<SqlErr>, err: DbErr, conflict: &str) -> AppError {
    match sql_err {
        Some(SqlErr::UniqueConstraintViolation(_)) => AppError::Conflict(conflict.to_string()),
        _ => AppError::Database(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = classify_write_error(
            Some(SqlErr::UniqueConstraintViolation(
                "idx_summary_like_unique".to_string(),
            )),
            DbErr::Custom("insert failed".to_string()),
            "Already liked",
        );
        assert!(matches!(err, AppError::Conflict(ref m) if m == "Already liked"));
    }

    #[test]
    fn test_other_errors_stay_database_errors() {
        let err = classify_write_error(
            Some(SqlErr::ForeignKeyConstraintViolation("fk_user".to_string())),
            DbErr::Custom("insert failed".to_string()),
            "unused",
        );
        assert!(matches!(err, AppError::Database(_)));

        // message text alone never decides
        let err = write_error(
            DbErr::Custom("duplicate key value violates unique constraint (23505)".to_string()),
            "unused",
        );
        assert!(matches!(err, AppError::Database(_)));
    }
}
