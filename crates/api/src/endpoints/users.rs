//! User lookup endpoints.

use axum::{Json, Router, extract::State, routing::post};
use habitgrid_common::{AppError, AppResult};
use habitgrid_core::{FollowCounts, Relation};
use serde::{Deserialize, Serialize};

use super::auth::UserResponse;
use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Show user request. Either field identifies the user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowUserRequest {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// Profile with counters and the viewer's relation.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub counts: FollowCounts,
    pub relation: Relation,
}

async fn show(
    AuthUser(viewer): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ShowUserRequest>,
) -> AppResult<ApiResponse<UserProfileResponse>> {
    let user = match (req.user_id, req.username) {
        (Some(id), _) => state.user_service.get(&id).await?,
        (None, Some(username)) => state.user_service.get_by_username(&username).await?,
        (None, None) => {
            return Err(AppError::BadRequest(
                "userId or username is required".to_string(),
            ));
        }
    };

    let counts = state.following_service.counts(&user.id).await?;
    let relation = state.following_service.relation(&viewer.id, &user.id).await?;

    Ok(ApiResponse::ok(UserProfileResponse {
        user: user.into(),
        counts,
        relation,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/show", post(show))
}
