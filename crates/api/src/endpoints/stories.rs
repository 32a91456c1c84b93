//! Story endpoints.

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    middleware,
    routing::post,
};
use habitgrid_common::{AppError, AppResult};
use habitgrid_core::services::media::MAX_PHOTO_BYTES;
use habitgrid_db::entities::story;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser, middleware::AppState, rate_limit::rate_limit_upload_middleware,
    response::ApiResponse,
};

/// Room for multipart boundaries and the other fields.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Story response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryResponse {
    pub id: String,
    pub user_id: String,
    pub activity_id: String,
    pub activity_name: String,
    pub date: chrono::NaiveDate,
    pub url: String,
    pub thumbnail_url: String,
    pub content_type: String,
    pub width: i32,
    pub height: i32,
    pub size: i64,
    pub created_at: String,
    pub expires_at: String,
}

impl From<story::Model> for StoryResponse {
    fn from(s: story::Model) -> Self {
        Self {
            id: s.id,
            user_id: s.user_id,
            activity_id: s.activity_id,
            activity_name: s.activity_name,
            date: s.date,
            url: s.url,
            thumbnail_url: s.thumbnail_url,
            content_type: s.content_type,
            width: s.width,
            height: s.height,
            size: s.size,
            created_at: s.created_at.to_rfc3339(),
            expires_at: s.expires_at.to_rfc3339(),
        }
    }
}

/// List request. `userId` defaults to the signed-in user.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStoriesRequest {
    pub user_id: Option<String>,
}

/// Delete request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStoryRequest {
    pub story_id: String,
}

/// Upload a photo for an activity (multipart: `activityId`, `file`).
async fn upload(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<ApiResponse<StoryResponse>> {
    let mut activity_id: Option<String> = None;
    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("activityId") => {
                activity_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::BadRequest(e.to_string()))?,
                );
            }
            Some("file") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_data = Some(data.to_vec());
            }
            _ => {}
        }
    }

    let activity_id =
        activity_id.ok_or_else(|| AppError::BadRequest("activityId is required".to_string()))?;
    let data = file_data.ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;
    if data.len() > state.max_upload_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "photo exceeds {} bytes",
            state.max_upload_bytes
        )));
    }

    let story = state
        .story_service
        .upload(&user.id, &activity_id, &data)
        .await?;
    Ok(ApiResponse::ok(story.into()))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListStoriesRequest>,
) -> AppResult<ApiResponse<Vec<StoryResponse>>> {
    let owner_id = req.user_id.unwrap_or_else(|| user.id.clone());
    let stories = state.story_service.list(&user.id, &owner_id).await?;
    Ok(ApiResponse::ok(
        stories.into_iter().map(StoryResponse::from).collect(),
    ))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeleteStoryRequest>,
) -> AppResult<ApiResponse<()>> {
    state.story_service.delete(&user.id, &req.story_id).await?;
    Ok(ApiResponse::ok(()))
}

pub fn router() -> Router<AppState> {
    let uploads = Router::new()
        .route("/upload", post(upload))
        .layer(DefaultBodyLimit::max(MAX_PHOTO_BYTES + MULTIPART_OVERHEAD))
        .route_layer(middleware::from_fn(rate_limit_upload_middleware));

    Router::new()
        .merge(uploads)
        .route("/list", post(list))
        .route("/delete", post(delete))
}
