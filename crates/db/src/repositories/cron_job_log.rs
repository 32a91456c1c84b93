//! Daily job log repository.

use std::sync::Arc;

use crate::entities::{CronJobLog, cron_job_log, cron_job_log::CronStatus};
use chrono::{NaiveDate, Utc};
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, sea_query::Expr,
    sea_query::OnConflict,
};

/// Cron job log repository for database operations.
#[derive(Clone)]
pub struct CronJobLogRepository {
    db: Arc<DatabaseConnection>,
}

impl CronJobLogRepository {
    /// Create a new cron job log repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Insert the `running` row for a job and date unless one exists.
    ///
    /// Returns `true` when this call inserted the row and therefore owns the run.
    pub async fn try_insert_running(
        &self,
        id: String,
        job_name: &str,
        job_date: NaiveDate,
    ) -> AppResult<bool> {
        let row = cron_job_log::ActiveModel {
            id: Set(id),
            job_name: Set(job_name.to_string()),
            job_date: Set(job_date),
            status: Set(CronStatus::Running),
            detail: Set(None),
            started_at: Set(Utc::now().fixed_offset()),
            finished_at: Set(None),
        };

        let inserted = CronJobLog::insert(row)
            .on_conflict(
                OnConflict::columns([
                    cron_job_log::Column::JobName,
                    cron_job_log::Column::JobDate,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted == 1)
    }

    /// Set the final status of a run.
    pub async fn finish(
        &self,
        job_name: &str,
        job_date: NaiveDate,
        status: CronStatus,
        detail: Option<String>,
    ) -> AppResult<()> {
        CronJobLog::update_many()
            .col_expr(cron_job_log::Column::Status, Expr::value(status))
            .col_expr(cron_job_log::Column::Detail, Expr::value(detail))
            .col_expr(
                cron_job_log::Column::FinishedAt,
                Expr::value(Utc::now().fixed_offset()),
            )
            .filter(cron_job_log::Column::JobName.eq(job_name))
            .filter(cron_job_log::Column::JobDate.eq(job_date))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
