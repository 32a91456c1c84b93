//! Summary like endpoints.

use axum::{Json, Router, extract::State, middleware, routing::post};
use chrono::NaiveDate;
use habitgrid_common::AppResult;
use habitgrid_core::{LikeState, Liker};
use serde::Deserialize;
use validator::Validate;

use crate::{
    extractors::AuthUser, middleware::AppState, rate_limit::rate_limit_write_middleware,
    response::ApiResponse,
};

/// Default page size for likers.
const DEFAULT_LIMIT: u64 = 30;

/// A summary is identified by its owner and date.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRef {
    pub user_id: String,
    pub date: NaiveDate,
}

/// React request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactRequest {
    pub user_id: String,
    pub date: NaiveDate,
    pub reaction: String,
}

/// Likers request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListLikersRequest {
    pub user_id: String,
    pub date: NaiveDate,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

async fn toggle(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SummaryRef>,
) -> AppResult<ApiResponse<LikeState>> {
    let like = state
        .like_service
        .toggle(&user.id, &req.user_id, req.date)
        .await?;
    Ok(ApiResponse::ok(like))
}

async fn react(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReactRequest>,
) -> AppResult<ApiResponse<LikeState>> {
    let like = state
        .like_service
        .react(&user.id, &req.user_id, req.date, &req.reaction)
        .await?;
    Ok(ApiResponse::ok(like))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListLikersRequest>,
) -> AppResult<ApiResponse<Vec<Liker>>> {
    req.validate()?;
    let likers = state
        .like_service
        .likers(
            &user.id,
            &req.user_id,
            req.date,
            req.limit.unwrap_or(DEFAULT_LIMIT),
            req.until_id.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(likers))
}

pub fn router() -> Router<AppState> {
    let writes = Router::new()
        .route("/toggle", post(toggle))
        .route("/react", post(react))
        .route_layer(middleware::from_fn(rate_limit_write_middleware));

    Router::new().merge(writes).route("/list", post(list))
}
