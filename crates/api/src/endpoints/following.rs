//! Following endpoints.

use axum::{Json, Router, extract::State, middleware, routing::post};
use habitgrid_common::{AppError, AppResult};
use habitgrid_core::{FollowCounts, FollowEntry, Relation};
use habitgrid_db::entities::follow_edge_by_follower::FollowState;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    extractors::AuthUser, middleware::AppState, rate_limit::rate_limit_write_middleware,
    response::ApiResponse,
};

/// Request naming the other user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdRequest {
    pub user_id: String,
}

/// Follow result response.
#[derive(Serialize)]
pub struct FollowResponse {
    pub state: FollowState,
}

/// Listing request. `userId` defaults to the signed-in user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListFollowsRequest {
    pub user_id: Option<String>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Own pending requests.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListRequestsRequest {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Optional user for counters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountsRequest {
    pub user_id: Option<String>,
}

async fn follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<FollowResponse>> {
    let follow_state = state.following_service.follow(&user.id, &req.user_id).await?;
    Ok(ApiResponse::ok(FollowResponse {
        state: follow_state,
    }))
}

/// Unfollow a user, or cancel a pending request.
async fn unfollow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .following_service
        .unfollow(&user.id, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn accept(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .following_service
        .accept_request(&user.id, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn reject(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .following_service
        .reject_request(&user.id, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn remove_follower(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .following_service
        .remove_follower(&user.id, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn requests(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListRequestsRequest>,
) -> AppResult<ApiResponse<Vec<FollowEntry>>> {
    req.validate()?;
    let entries = state
        .following_service
        .pending_requests(&user.id, req.limit, req.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(entries))
}

/// Resolve the listed user and check the viewer may see their follow lists.
async fn visible_target(
    state: &AppState,
    viewer_id: &str,
    user_id: Option<String>,
) -> AppResult<String> {
    let Some(user_id) = user_id.filter(|id| id != viewer_id) else {
        return Ok(viewer_id.to_string());
    };
    let owner = state.user_service.get(&user_id).await?;
    if !state.following_service.can_view(viewer_id, &owner).await? {
        return Err(AppError::Forbidden("This account is private".to_string()));
    }
    Ok(owner.id)
}

async fn followers(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListFollowsRequest>,
) -> AppResult<ApiResponse<Vec<FollowEntry>>> {
    req.validate()?;
    let target = visible_target(&state, &user.id, req.user_id).await?;
    let entries = state
        .following_service
        .followers(&target, req.limit, req.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(entries))
}

async fn following(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListFollowsRequest>,
) -> AppResult<ApiResponse<Vec<FollowEntry>>> {
    req.validate()?;
    let target = visible_target(&state, &user.id, req.user_id).await?;
    let entries = state
        .following_service
        .following(&target, req.limit, req.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(entries))
}

async fn relation(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UserIdRequest>,
) -> AppResult<ApiResponse<Relation>> {
    let relation = state
        .following_service
        .relation(&user.id, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(relation))
}

async fn counts(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CountsRequest>,
) -> AppResult<ApiResponse<FollowCounts>> {
    let user_id = req.user_id.unwrap_or(user.id);
    Ok(ApiResponse::ok(state.following_service.counts(&user_id).await?))
}

pub fn router() -> Router<AppState> {
    let writes = Router::new()
        .route("/create", post(follow))
        .route("/delete", post(unfollow))
        .route("/requests/accept", post(accept))
        .route("/requests/reject", post(reject))
        .route("/followers/remove", post(remove_follower))
        .route_layer(middleware::from_fn(rate_limit_write_middleware));

    Router::new()
        .merge(writes)
        .route("/requests/list", post(requests))
        .route("/followers", post(followers))
        .route("/following", post(following))
        .route("/relation", post(relation))
        .route("/counts", post(counts))
}
