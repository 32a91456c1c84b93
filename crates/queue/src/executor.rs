//! Daily jobs bound to the core services.

use chrono::{DateTime, NaiveDate, Utc};
use habitgrid_common::AppResult;
use habitgrid_core::services::{ReminderReport, ReminderService, StoryService, StreakService};

use crate::scheduler::JobExecutor;

/// [`JobExecutor`] backed by the application services.
#[derive(Clone)]
pub struct ServiceExecutor {
    streak_service: StreakService,
    reminder_service: ReminderService,
    story_service: StoryService,
}

impl ServiceExecutor {
    /// Create a new executor.
    #[must_use]
    pub const fn new(
        streak_service: StreakService,
        reminder_service: ReminderService,
        story_service: StoryService,
    ) -> Self {
        Self {
            streak_service,
            reminder_service,
            story_service,
        }
    }
}

#[async_trait::async_trait]
impl JobExecutor for ServiceExecutor {
    async fn streak_rollover(&self, run_date: NaiveDate) -> AppResult<u64> {
        self.streak_service.rollover(run_date).await
    }

    async fn reminder_emails(&self, now: DateTime<Utc>) -> AppResult<ReminderReport> {
        self.reminder_service.run(now).await
    }

    async fn story_cleanup(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.story_service.purge_expired(now).await
    }
}
