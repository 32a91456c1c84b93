//! Notification endpoints.

use axum::{Json, Router, extract::State, routing::post};
use habitgrid_common::AppResult;
use habitgrid_core::ListNotificationsInput;
use habitgrid_db::entities::notification::{self, NotificationKind};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Notification response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationResponse {
    pub id: String,
    pub kind: NotificationKind,
    pub actor_id: Option<String>,
    pub entity_type: String,
    pub entity_key: String,
    pub metadata: serde_json::Value,
    pub is_read: bool,
    pub created_at: String,
}

impl From<notification::Model> for NotificationResponse {
    fn from(n: notification::Model) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            actor_id: n.actor_id,
            entity_type: n.entity_type,
            entity_key: n.entity_key,
            metadata: n.metadata,
            is_read: n.is_read,
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Unread counter.
#[derive(Serialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

/// Number of rows a bulk update touched.
#[derive(Serialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

/// Mark read request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadRequest {
    #[validate(length(min = 1, max = 100))]
    pub notification_ids: Vec<String>,
}

/// Delete request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteNotificationRequest {
    pub notification_id: String,
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListNotificationsInput>,
) -> AppResult<ApiResponse<Vec<NotificationResponse>>> {
    let notifications = state.notification_service.list(&user.id, req).await?;
    Ok(ApiResponse::ok(
        notifications
            .into_iter()
            .map(NotificationResponse::from)
            .collect(),
    ))
}

async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UnreadCountResponse>> {
    let count = state.notification_service.unread_count(&user.id).await?;
    Ok(ApiResponse::ok(UnreadCountResponse { count }))
}

async fn mark_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MarkReadRequest>,
) -> AppResult<ApiResponse<UpdatedResponse>> {
    req.validate()?;
    let updated = state
        .notification_service
        .mark_read(&user.id, &req.notification_ids)
        .await?;
    Ok(ApiResponse::ok(UpdatedResponse { updated }))
}

async fn mark_all_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UpdatedResponse>> {
    let updated = state.notification_service.mark_all_read(&user.id).await?;
    Ok(ApiResponse::ok(UpdatedResponse { updated }))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeleteNotificationRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .notification_service
        .delete(&user.id, &req.notification_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/list", post(list))
        .route("/unread-count", post(unread_count))
        .route("/mark-read", post(mark_read))
        .route("/mark-all-read", post(mark_all_read))
        .route("/delete", post(delete))
}
