//! Notification service.

use chrono::{NaiveDate, Utc};
use habitgrid_common::{AppError, AppResult, IdGenerator};
use habitgrid_db::{
    entities::{
        notification::{self, NotificationKind},
        notification_dedupe,
    },
    repositories::{NotificationFilter, NotificationRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};

use crate::services::jobs::JobSender;

/// Default page size for listings.
pub const DEFAULT_LIMIT: u64 = 20;

/// Largest page size a caller may request.
pub const MAX_LIMIT: u64 = 100;

/// Kind-specific payload stored in `notification.metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationMetadata {
    Follow {
        username: String,
    },
    FollowRequest {
        username: String,
    },
    FollowAccepted {
        username: String,
    },
    Like {
        username: String,
        date: NaiveDate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reaction: Option<String>,
    },
    Story {
        username: String,
        story_id: String,
        activity_name: String,
    },
    Reminder {
        date: NaiveDate,
    },
}

impl NotificationMetadata {
    /// Stored kind.
    #[must_use]
    pub const fn kind(&self) -> NotificationKind {
        match self {
            Self::Follow { .. } => NotificationKind::Follow,
            Self::FollowRequest { .. } => NotificationKind::FollowRequest,
            Self::FollowAccepted { .. } => NotificationKind::FollowAccepted,
            Self::Like { .. } => NotificationKind::Like,
            Self::Story { .. } => NotificationKind::Story,
            Self::Reminder { .. } => NotificationKind::Reminder,
        }
    }

    /// The entity the notification is about, as `(entity_type, entity_key)`.
    ///
    /// Together with recipient, actor and kind this is the dedupe identity.
    #[must_use]
    pub fn entity(&self, actor_id: Option<&str>) -> (&'static str, String) {
        match self {
            Self::Follow { .. } | Self::FollowRequest { .. } | Self::FollowAccepted { .. } => {
                ("user", actor_id.unwrap_or_default().to_string())
            }
            Self::Like { date, .. } => ("summary", date.to_string()),
            Self::Story { story_id, .. } => ("story", story_id.clone()),
            Self::Reminder { date } => ("day", date.to_string()),
        }
    }

    /// Title, body and click-through path for a push message.
    #[must_use]
    pub fn render(&self) -> (String, String, String) {
        match self {
            Self::Follow { username } => (
                "New follower".to_string(),
                format!("@{username} started following you"),
                format!("/@{username}"),
            ),
            Self::FollowRequest { username } => (
                "Follow request".to_string(),
                format!("@{username} wants to follow you"),
                "/follow-requests".to_string(),
            ),
            Self::FollowAccepted { username } => (
                "Request accepted".to_string(),
                format!("@{username} accepted your follow request"),
                format!("/@{username}"),
            ),
            Self::Like {
                username,
                date,
                reaction,
            } => (
                "New like".to_string(),
                match reaction {
                    Some(r) => format!("@{username} reacted {r} to your day {date}"),
                    None => format!("@{username} liked your day {date}"),
                },
                format!("/summaries/{date}"),
            ),
            Self::Story {
                username,
                activity_name,
                ..
            } => (
                "New story".to_string(),
                format!("@{username} posted a story for {activity_name}"),
                format!("/@{username}/stories"),
            ),
            Self::Reminder { date } => (
                "Log your day".to_string(),
                format!("You haven't logged anything for {date} yet"),
                "/".to_string(),
            ),
        }
    }
}

/// Options for listing notifications.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListNotificationsInput {
    pub limit: Option<u64>,
    pub until_id: Option<String>,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub kinds: Vec<String>,
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    job_sender: Option<JobSender>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub const fn new(notification_repo: NotificationRepository) -> Self {
        Self {
            notification_repo,
            job_sender: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the job sender for push fan-out.
    pub fn set_job_sender(&mut self, job_sender: JobSender) {
        self.job_sender = Some(job_sender);
    }

    /// Create a notification unless an identical one was already delivered.
    ///
    /// Returns `None` for self-notifications and for duplicates.
    pub async fn notify(
        &self,
        user_id: &str,
        actor_id: Option<&str>,
        metadata: NotificationMetadata,
    ) -> AppResult<Option<notification::Model>> {
        if actor_id == Some(user_id) {
            return Ok(None);
        }

        let kind = metadata.kind();
        let (entity_type, entity_key) = metadata.entity(actor_id);
        let id = self.id_gen.generate();
        let now = Utc::now().fixed_offset();
        let json = serde_json::to_value(&metadata)
            .map_err(|e| AppError::Internal(format!("Failed to encode metadata: {e}")))?;

        let claim = notification_dedupe::ActiveModel {
            user_id: Set(user_id.to_string()),
            actor_id: Set(actor_id.unwrap_or_default().to_string()),
            kind: Set(kind.as_str().to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_key: Set(entity_key.clone()),
            notification_id: Set(id.clone()),
            created_at: Set(now),
        };
        let model = notification::ActiveModel {
            id: Set(id),
            user_id: Set(user_id.to_string()),
            actor_id: Set(actor_id.map(ToString::to_string)),
            kind: Set(kind),
            entity_type: Set(entity_type.to_string()),
            entity_key: Set(entity_key),
            metadata: Set(json),
            is_read: Set(false),
            created_at: Set(now),
        };

        let Some(created) = self.notification_repo.create_deduped(claim, model).await? else {
            tracing::debug!(user_id = %user_id, kind = kind.as_str(), "Duplicate notification skipped");
            return Ok(None);
        };

        if let Some(ref job_sender) = self.job_sender {
            if let Err(e) = job_sender.push_fanout(created.id.clone()).await {
                tracing::warn!(error = %e, notification_id = %created.id, "Failed to enqueue push fan-out");
            }
        }

        Ok(Some(created))
    }

    /// Notifications of a user, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        input: ListNotificationsInput,
    ) -> AppResult<Vec<notification::Model>> {
        let kinds = input
            .kinds
            .iter()
            .map(|k| {
                NotificationKind::parse(k)
                    .ok_or_else(|| AppError::Validation(format!("unknown notification kind {k:?}")))
            })
            .collect::<AppResult<Vec<_>>>()?;
        let filter = NotificationFilter {
            unread_only: input.unread_only,
            kinds,
        };
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        self.notification_repo
            .find_by_user(user_id, &filter, limit, input.until_id.as_deref())
            .await
    }

    /// Count unread notifications.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.count_unread(user_id).await
    }

    /// Mark specific notifications as read.
    pub async fn mark_read(&self, user_id: &str, ids: &[String]) -> AppResult<u64> {
        self.notification_repo.mark_read(user_id, ids).await
    }

    /// Mark every notification as read.
    pub async fn mark_all_read(&self, user_id: &str) -> AppResult<u64> {
        self.notification_repo.mark_all_read(user_id).await
    }

    /// Delete a notification.
    pub async fn delete(&self, user_id: &str, id: &str) -> AppResult<()> {
        if self.notification_repo.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound("Notification not found".to_string()))
        }
    }
}

/// Decode stored metadata.
pub fn decode_metadata(model: &notification::Model) -> AppResult<NotificationMetadata> {
    serde_json::from_value(model.metadata.clone())
        .map_err(|e| AppError::Internal(format!("Corrupt notification metadata: {e}")))
}
