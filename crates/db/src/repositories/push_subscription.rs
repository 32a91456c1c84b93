//! Push subscription, preference and delivery log repository.

use std::sync::Arc;

use crate::entities::{
    PushDeliveryLog, PushPreference, PushSubscription, push_delivery_log, push_preference,
    push_subscription,
};
use habitgrid_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    sea_query::OnConflict,
};

/// Push repository for database operations.
#[derive(Clone)]
pub struct PushSubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl PushSubscriptionRepository {
    /// Create a new push repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a subscription by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<push_subscription::Model>> {
        PushSubscription::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a subscription by endpoint URL.
    pub async fn find_by_endpoint(
        &self,
        endpoint: &str,
    ) -> AppResult<Option<push_subscription::Model>> {
        PushSubscription::find()
            .filter(push_subscription::Column::Endpoint.eq(endpoint))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// All subscriptions of a user, including disabled ones.
    pub async fn find_by_user(&self, user_id: &str) -> AppResult<Vec<push_subscription::Model>> {
        PushSubscription::find()
            .filter(push_subscription::Column::UserId.eq(user_id))
            .order_by_asc(push_subscription::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Subscriptions of a user that still receive pushes.
    pub async fn find_enabled_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<push_subscription::Model>> {
        PushSubscription::find()
            .filter(push_subscription::Column::UserId.eq(user_id))
            .filter(push_subscription::Column::DisabledAt.is_null())
            .order_by_asc(push_subscription::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a subscription.
    pub async fn create(
        &self,
        model: push_subscription::ActiveModel,
    ) -> AppResult<push_subscription::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| super::write_error(e, "Endpoint already registered"))
    }

    /// Update a subscription.
    pub async fn update(
        &self,
        model: push_subscription::ActiveModel,
    ) -> AppResult<push_subscription::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a subscription by ID. Returns whether a row was removed.
    pub async fn delete(&self, id: &str) -> AppResult<bool> {
        let result = PushSubscription::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected > 0)
    }

    /// Find the preferences of a user.
    pub async fn find_preference(
        &self,
        user_id: &str,
    ) -> AppResult<Option<push_preference::Model>> {
        PushPreference::find_by_id(user_id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert or overwrite the preferences of a user.
    pub async fn upsert_preference(&self, model: push_preference::ActiveModel) -> AppResult<()> {
        PushPreference::insert(model)
            .on_conflict(
                OnConflict::column(push_preference::Column::UserId)
                    .update_columns([
                        push_preference::Column::Enabled,
                        push_preference::Column::QuietHoursStart,
                        push_preference::Column::QuietHoursEnd,
                        push_preference::Column::DisabledKinds,
                        push_preference::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Find the delivery log row for a message.
    pub async fn find_delivery(
        &self,
        message_id: &str,
    ) -> AppResult<Option<push_delivery_log::Model>> {
        PushDeliveryLog::find()
            .filter(push_delivery_log::Column::MessageId.eq(message_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Record the latest outcome for a message, replacing earlier attempts.
    pub async fn record_delivery(&self, model: push_delivery_log::ActiveModel) -> AppResult<()> {
        PushDeliveryLog::insert(model)
            .on_conflict(
                OnConflict::column(push_delivery_log::Column::MessageId)
                    .update_columns([
                        push_delivery_log::Column::Status,
                        push_delivery_log::Column::HttpStatus,
                        push_delivery_log::Column::Error,
                        push_delivery_log::Column::Attempt,
                        push_delivery_log::Column::CreatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}
