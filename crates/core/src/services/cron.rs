//! Once-per-day job ownership across replicas.

use chrono::NaiveDate;
use habitgrid_common::{AppResult, IdGenerator};
use habitgrid_db::{entities::cron_job_log::CronStatus, repositories::CronJobLogRepository};

/// Streak rollover job name.
pub const STREAK_ROLLOVER: &str = "streak_rollover";
/// Reminder job name.
pub const REMINDER_EMAILS: &str = "reminder_emails";
/// Expired story purge job name.
pub const STORY_CLEANUP: &str = "story_cleanup";

/// Lock over the `(job, date)` unique row of the cron log.
#[derive(Clone)]
pub struct CronLockService {
    repo: CronJobLogRepository,
    id_gen: IdGenerator,
}

impl CronLockService {
    /// Create a new cron lock service.
    #[must_use]
    pub const fn new(repo: CronJobLogRepository) -> Self {
        Self {
            repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Claim the run of `job` for `date`. Only the first caller gets `true`,
    /// whatever became of that run.
    pub async fn try_acquire(&self, job: &str, date: NaiveDate) -> AppResult<bool> {
        let acquired = self
            .repo
            .try_insert_running(self.id_gen.generate(), job, date)
            .await?;
        if !acquired {
            tracing::debug!(job, %date, "Cron run already claimed");
        }
        Ok(acquired)
    }

    /// Mark a claimed run as succeeded.
    pub async fn complete(&self, job: &str, date: NaiveDate, detail: String) -> AppResult<()> {
        self.repo
            .finish(job, date, CronStatus::Succeeded, Some(detail))
            .await
    }

    /// Mark a claimed run as failed.
    pub async fn fail(&self, job: &str, date: NaiveDate, error: String) -> AppResult<()> {
        self.repo
            .finish(job, date, CronStatus::Failed, Some(error))
            .await
    }
}
