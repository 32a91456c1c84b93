//! Daily summary endpoints.

use axum::{Json, Router, extract::State, routing::post};
use chrono::NaiveDate;
use habitgrid_common::{AppResult, local_date, parse_timezone};
use habitgrid_core::{DailySummary, StreakState};
use serde::Deserialize;
use validator::Validate;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Show request. `userId` defaults to the signed-in user.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShowSummaryRequest {
    pub user_id: Option<String>,
    pub date: NaiveDate,
}

/// Feed request. `date` defaults to the viewer's local today.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequest {
    pub date: Option<NaiveDate>,
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<u64>,
    pub until_id: Option<String>,
}

/// Streak request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakRequest {
    pub user_id: Option<String>,
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ShowSummaryRequest>,
) -> AppResult<ApiResponse<DailySummary>> {
    let owner_id = req.user_id.unwrap_or_else(|| user.id.clone());
    let summary = state
        .summary_service
        .show(&user.id, &owner_id, req.date)
        .await?;
    Ok(ApiResponse::ok(summary))
}

async fn feed(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<FeedRequest>,
) -> AppResult<ApiResponse<Vec<DailySummary>>> {
    req.validate()?;
    let date = match req.date {
        Some(date) => date,
        None => local_date(parse_timezone(&user.timezone)?, chrono::Utc::now()),
    };
    let summaries = state
        .summary_service
        .feed(&user.id, date, req.limit, req.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(summaries))
}

async fn streak(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<StreakRequest>,
) -> AppResult<ApiResponse<StreakState>> {
    let owner_id = req.user_id.unwrap_or_else(|| user.id.clone());
    let streak = state.summary_service.streak(&user.id, &owner_id).await?;
    Ok(ApiResponse::ok(streak))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/show", post(show))
        .route("/feed", post(feed))
        .route("/streak", post(streak))
}
