//! Scheduled daily jobs.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, Utc};
use habitgrid_common::{AppResult, config::JobsConfig, parse_hhmm};
use habitgrid_core::services::{
    CronLockService, ReminderReport,
    cron::{REMINDER_EMAILS, STORY_CLEANUP, STREAK_ROLLOVER},
};
use tokio::task::JoinHandle;

/// Daily job types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyJob {
    /// Reset streaks of users idle since before yesterday.
    StreakRollover,
    /// Remind users who logged nothing today.
    ReminderEmails,
    /// Purge expired stories and their files.
    StoryCleanup,
}

impl DailyJob {
    pub const ALL: [Self; 3] = [Self::StreakRollover, Self::ReminderEmails, Self::StoryCleanup];

    /// Name recorded in the cron log.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StreakRollover => STREAK_ROLLOVER,
            Self::ReminderEmails => REMINDER_EMAILS,
            Self::StoryCleanup => STORY_CLEANUP,
        }
    }
}

/// Scheduler configuration: the UTC time of day each job runs at.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Streak rollover (default: 00:05).
    pub streak_rollover_at: NaiveTime,
    /// Reminder emails (default: 20:00).
    pub reminder_at: NaiveTime,
    /// Story cleanup (default: 00:15).
    pub story_cleanup_at: NaiveTime,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            streak_rollover_at: NaiveTime::from_hms_opt(0, 5, 0).unwrap_or_default(),
            reminder_at: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
            story_cleanup_at: NaiveTime::from_hms_opt(0, 15, 0).unwrap_or_default(),
        }
    }
}

impl SchedulerConfig {
    /// Parse the `HH:MM` values of the jobs section.
    pub fn from_jobs(config: &JobsConfig) -> AppResult<Self> {
        Ok(Self {
            streak_rollover_at: parse_hhmm(&config.streak_rollover_at)?,
            reminder_at: parse_hhmm(&config.reminder_at)?,
            story_cleanup_at: parse_hhmm(&config.story_cleanup_at)?,
        })
    }

    /// When a job runs.
    #[must_use]
    pub const fn time_of(&self, job: DailyJob) -> NaiveTime {
        match job {
            DailyJob::StreakRollover => self.streak_rollover_at,
            DailyJob::ReminderEmails => self.reminder_at,
            DailyJob::StoryCleanup => self.story_cleanup_at,
        }
    }
}

/// Time left until the next `at` strictly after `now`.
#[must_use]
pub fn delay_until(now: DateTime<Utc>, at: NaiveTime) -> Duration {
    let mut next = now.date_naive().and_time(at).and_utc();
    if next <= now {
        next += chrono::Duration::days(1);
    }
    (next - now).to_std().unwrap_or(Duration::ZERO)
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Execute the streak rollover for a run date.
    async fn streak_rollover(&self, run_date: chrono::NaiveDate) -> AppResult<u64>;

    /// Execute the reminder job.
    async fn reminder_emails(&self, now: DateTime<Utc>) -> AppResult<ReminderReport>;

    /// Execute the expired story cleanup.
    async fn story_cleanup(&self, now: DateTime<Utc>) -> AppResult<u64>;
}

async fn execute<E: JobExecutor + ?Sized>(
    executor: &E,
    job: DailyJob,
    scheduled_for: DateTime<Utc>,
) -> AppResult<String> {
    match job {
        DailyJob::StreakRollover => {
            let reset = executor.streak_rollover(scheduled_for.date_naive()).await?;
            Ok(format!("reset {reset} streaks"))
        }
        DailyJob::ReminderEmails => Ok(executor.reminder_emails(scheduled_for).await?.to_string()),
        DailyJob::StoryCleanup => {
            let purged = executor.story_cleanup(scheduled_for).await?;
            Ok(format!("purged {purged} stories"))
        }
    }
}

/// Run one job for the day of `scheduled_for` unless another replica claimed it.
///
/// Returns whether this call owned the run. A failed run is recorded and
/// not retried for the same day.
pub async fn run_once<E: JobExecutor + ?Sized>(
    executor: &E,
    lock: &CronLockService,
    job: DailyJob,
    scheduled_for: DateTime<Utc>,
) -> AppResult<bool> {
    let date = scheduled_for.date_naive();
    if !lock.try_acquire(job.name(), date).await? {
        return Ok(false);
    }

    tracing::info!(job = job.name(), %date, "Daily job started");
    match execute(executor, job, scheduled_for).await {
        Ok(detail) => {
            tracing::info!(job = job.name(), %date, detail = %detail, "Daily job succeeded");
            lock.complete(job.name(), date, detail).await?;
        }
        Err(e) => {
            tracing::error!(job = job.name(), %date, error = %e, "Daily job failed");
            lock.fail(job.name(), date, e.to_string()).await?;
        }
    }
    Ok(true)
}

/// Spawn one task per daily job. The tasks run until aborted.
pub fn spawn_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
    lock: CronLockService,
) -> Vec<JoinHandle<()>> {
    DailyJob::ALL
        .into_iter()
        .map(|job| {
            let at = config.time_of(job);
            let executor = executor.clone();
            let lock = lock.clone();

            tokio::spawn(async move {
                tracing::info!(job = job.name(), at = %at.format("%H:%M"), "Daily job scheduled");
                loop {
                    let now = Utc::now();
                    let wait = delay_until(now, at);
                    let scheduled_for = now + chrono::Duration::from_std(wait).unwrap_or_default();
                    tokio::time::sleep(wait).await;

                    if let Err(e) = run_once(executor.as_ref(), &lock, job, scheduled_for).await {
                        tracing::error!(job = job.name(), error = %e, "Failed to run daily job");
                    }
                }
            })
        })
        .collect()
}
