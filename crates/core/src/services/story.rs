//! Photo stories attached to activities.

use std::sync::Arc;

use chrono::{Duration, Utc};
use habitgrid_common::{AppError, AppResult, IdGenerator, StorageBackend, generate_storage_key};
use habitgrid_db::{
    entities::story,
    repositories::{ActivityRepository, FollowRepository, StoryRepository, UserRepository},
};
use sea_orm::Set;

use crate::services::media::{self, ProcessedPhoto};
use crate::services::notification::{NotificationMetadata, NotificationService};

/// How long a story stays visible.
pub const STORY_LIFETIME_HOURS: i64 = 24;

/// Expired stories removed per batch during cleanup.
const PURGE_BATCH: u64 = 100;

struct StoredFiles {
    key: String,
    url: String,
    thumbnail_key: String,
    thumbnail_url: String,
}

/// Story service for business logic.
#[derive(Clone)]
pub struct StoryService {
    story_repo: StoryRepository,
    activity_repo: ActivityRepository,
    user_repo: UserRepository,
    follow_repo: FollowRepository,
    storage: Arc<dyn StorageBackend>,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl StoryService {
    /// Create a new story service.
    #[must_use]
    pub fn new(
        story_repo: StoryRepository,
        activity_repo: ActivityRepository,
        user_repo: UserRepository,
        follow_repo: FollowRepository,
        storage: Arc<dyn StorageBackend>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            story_repo,
            activity_repo,
            user_repo,
            follow_repo,
            storage,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach a photo to one of the user's activities, replacing any earlier one.
    pub async fn upload(
        &self,
        user_id: &str,
        activity_id: &str,
        data: &[u8],
    ) -> AppResult<story::Model> {
        let activity = self
            .activity_repo
            .find_by_id(activity_id)
            .await?
            .filter(|a| a.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Activity not found".to_string()))?;

        let bytes = data.to_vec();
        let photo = tokio::task::spawn_blocking(move || media::process_photo(&bytes))
            .await
            .map_err(|e| AppError::Internal(format!("Photo processing task failed: {e}")))??;
        let files = self.store_files(user_id, data, &photo).await?;

        let now = Utc::now();
        let expires_at = now + Duration::hours(STORY_LIFETIME_HOURS);
        let existing = self.story_repo.find_by_activity(user_id, activity_id).await?;
        let is_new = existing.is_none();

        let result = match existing.clone() {
            Some(old) => {
                let mut active: story::ActiveModel = old.into();
                active.activity_name = Set(activity.name.clone());
                active.date = Set(activity.date);
                active.storage_key = Set(files.key.clone());
                active.thumbnail_key = Set(files.thumbnail_key.clone());
                active.url = Set(files.url.clone());
                active.thumbnail_url = Set(files.thumbnail_url.clone());
                active.content_type = Set(photo.format.mime_type().to_string());
                active.width = Set(photo.width as i32);
                active.height = Set(photo.height as i32);
                active.size = Set(data.len() as i64);
                active.created_at = Set(now.fixed_offset());
                active.expires_at = Set(expires_at.fixed_offset());
                self.story_repo.update(active).await
            }
            None => {
                self.story_repo
                    .create(story::ActiveModel {
                        id: Set(self.id_gen.generate()),
                        user_id: Set(user_id.to_string()),
                        activity_id: Set(activity.id.clone()),
                        activity_name: Set(activity.name.clone()),
                        date: Set(activity.date),
                        storage_key: Set(files.key.clone()),
                        thumbnail_key: Set(files.thumbnail_key.clone()),
                        url: Set(files.url.clone()),
                        thumbnail_url: Set(files.thumbnail_url.clone()),
                        content_type: Set(photo.format.mime_type().to_string()),
                        width: Set(photo.width as i32),
                        height: Set(photo.height as i32),
                        size: Set(data.len() as i64),
                        created_at: Set(now.fixed_offset()),
                        expires_at: Set(expires_at.fixed_offset()),
                    })
                    .await
            }
        };

        let saved = match result {
            Ok(saved) => saved,
            Err(e) => {
                self.remove_files(&files.key, &files.thumbnail_key).await;
                return Err(e);
            }
        };

        if let Some(old) = existing {
            self.remove_files(&old.storage_key, &old.thumbnail_key).await;
        }

        tracing::info!(user_id = %user_id, story_id = %saved.id, replaced = !is_new, "Story uploaded");

        if is_new {
            if let Err(e) = self.notify_followers(&saved).await {
                tracing::warn!(story_id = %saved.id, error = %e, "Failed to notify followers of story");
            }
        }

        Ok(saved)
    }

    /// Live stories of `owner_id` that the viewer may see, newest first.
    pub async fn list(&self, viewer_id: &str, owner_id: &str) -> AppResult<Vec<story::Model>> {
        let owner = self.user_repo.get_by_id(owner_id).await?;
        if viewer_id != owner.id && !self.follow_repo.is_active_follower(viewer_id, &owner.id).await? {
            return Err(AppError::Forbidden(
                "Stories are visible to followers only".to_string(),
            ));
        }
        self.story_repo.find_live_by_user(&owner.id, Utc::now()).await
    }

    /// Delete one of the user's stories and its files.
    pub async fn delete(&self, user_id: &str, story_id: &str) -> AppResult<()> {
        let story = self
            .story_repo
            .find_by_id(story_id)
            .await?
            .filter(|s| s.user_id == user_id)
            .ok_or_else(|| AppError::NotFound("Story not found".to_string()))?;

        self.story_repo.delete(&story.id).await?;
        self.remove_files(&story.storage_key, &story.thumbnail_key).await;
        Ok(())
    }

    /// Remove every story that expired before `now`. Returns how many went.
    pub async fn purge_expired(&self, now: chrono::DateTime<Utc>) -> AppResult<u64> {
        let mut purged = 0;
        loop {
            let batch = self.story_repo.find_expired(now, PURGE_BATCH).await?;
            let batch_len = batch.len() as u64;

            for story in batch {
                self.story_repo.delete(&story.id).await?;
                self.remove_files(&story.storage_key, &story.thumbnail_key).await;
                purged += 1;
            }

            if batch_len < PURGE_BATCH {
                break;
            }
        }

        if purged > 0 {
            tracing::info!(purged, "Expired stories purged");
        }
        Ok(purged)
    }

    async fn store_files(
        &self,
        user_id: &str,
        data: &[u8],
        photo: &ProcessedPhoto,
    ) -> AppResult<StoredFiles> {
        let stem = self.id_gen.generate();
        let key = generate_storage_key(user_id, &stem, photo.format.extension());
        let thumbnail_key = generate_storage_key(user_id, &format!("{stem}_thumb"), "jpg");

        let original = self
            .storage
            .upload(&key, data, photo.format.mime_type())
            .await?;
        let thumbnail = match self
            .storage
            .upload(&thumbnail_key, &photo.thumbnail, "image/jpeg")
            .await
        {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                self.remove_files(&key, &thumbnail_key).await;
                return Err(e);
            }
        };

        Ok(StoredFiles {
            key: original.key,
            url: original.url,
            thumbnail_key: thumbnail.key,
            thumbnail_url: thumbnail.url,
        })
    }

    async fn remove_files(&self, key: &str, thumbnail_key: &str) {
        for key in [key, thumbnail_key] {
            if let Err(e) = self.storage.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete story file");
            }
        }
    }

    async fn notify_followers(&self, story: &story::Model) -> AppResult<()> {
        let owner = self.user_repo.get_by_id(&story.user_id).await?;
        let followers = self.follow_repo.active_follower_ids(&story.user_id).await?;

        for follower_id in followers {
            let metadata = NotificationMetadata::Story {
                username: owner.username.clone(),
                story_id: story.id.clone(),
                activity_name: story.activity_name.clone(),
            };
            if let Err(e) = self
                .notification_service
                .notify(&follower_id, Some(&story.user_id), metadata)
                .await
            {
                tracing::warn!(follower_id = %follower_id, error = %e, "Failed to notify follower of story");
            }
        }
        Ok(())
    }
}
