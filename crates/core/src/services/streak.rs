//! Streak service.
//!
//! A streak counts consecutive days with at least one logged activity.
//! Logging advances it immediately; the daily rollover job zeroes the
//! streaks of users who missed a day.

use chrono::{Duration, NaiveDate, Utc};
use habitgrid_common::AppResult;
use habitgrid_db::{entities::streak, repositories::StreakRepository};
use sea_orm::Set;
use serde::Serialize;

/// Streak counters, detached from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakState {
    pub current: i32,
    pub longest: i32,
    pub last_active_date: Option<NaiveDate>,
}

impl From<&streak::Model> for StreakState {
    fn from(model: &streak::Model) -> Self {
        Self {
            current: model.current_streak,
            longest: model.longest_streak,
            last_active_date: model.last_active_date,
        }
    }
}

/// Apply a logged day to the streak.
///
/// Same day or an older day leaves it unchanged, the next day extends it,
/// and any gap restarts it at 1.
#[must_use]
pub fn advance(state: StreakState, day: NaiveDate) -> StreakState {
    let current = match state.last_active_date {
        None => 1,
        Some(last) if day <= last => return state,
        Some(last) if last.succ_opt() == Some(day) => state.current + 1,
        Some(_) => 1,
    };

    StreakState {
        current,
        longest: state.longest.max(current),
        last_active_date: Some(day),
    }
}

/// Last date a streak may have been active on and still survive a rollover run on `run_date`.
#[must_use]
pub fn rollover_cutoff(run_date: NaiveDate) -> NaiveDate {
    run_date - Duration::days(1)
}

/// Streak service for business logic.
#[derive(Clone)]
pub struct StreakService {
    streak_repo: StreakRepository,
}

impl StreakService {
    /// Create a new streak service.
    #[must_use]
    pub const fn new(streak_repo: StreakRepository) -> Self {
        Self { streak_repo }
    }

    /// Current streak of a user; zeros when nothing has been logged yet.
    pub async fn get(&self, user_id: &str) -> AppResult<StreakState> {
        Ok(self
            .streak_repo
            .find(user_id)
            .await?
            .as_ref()
            .map(StreakState::from)
            .unwrap_or_default())
    }

    /// Record activity on `day`.
    pub async fn record_activity(&self, user_id: &str, day: NaiveDate) -> AppResult<StreakState> {
        let before = self.get(user_id).await?;
        let after = advance(before, day);
        if after == before {
            return Ok(before);
        }

        self.streak_repo
            .upsert(streak::ActiveModel {
                user_id: Set(user_id.to_string()),
                current_streak: Set(after.current),
                longest_streak: Set(after.longest),
                last_active_date: Set(after.last_active_date),
                updated_at: Set(Utc::now().fixed_offset()),
            })
            .await?;

        tracing::debug!(user_id = %user_id, current = after.current, "Streak advanced");
        Ok(after)
    }

    /// Zero every streak that was not extended yesterday. Returns the number reset.
    pub async fn rollover(&self, run_date: NaiveDate) -> AppResult<u64> {
        let reset = self
            .streak_repo
            .reset_inactive_before(rollover_cutoff(run_date))
            .await?;
        tracing::info!(run_date = %run_date, reset, "Streak rollover finished");
        Ok(reset)
    }
}
