//! Activity endpoints.

use axum::{Json, Router, extract::State, middleware, routing::post};
use chrono::NaiveDate;
use habitgrid_common::{AppError, AppResult};
use habitgrid_core::{SaveActivityInput, SaveOutcome};
use habitgrid_db::entities::activity;
use serde::Deserialize;

use crate::{
    extractors::AuthUser, middleware::AppState, rate_limit::rate_limit_write_middleware,
    response::ApiResponse,
};

/// Delete activity request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteActivityRequest {
    pub activity_id: String,
}

/// List request: one `date`, or an inclusive `from`/`to` range.
#[derive(Debug, Deserialize)]
pub struct ListActivitiesRequest {
    pub date: Option<NaiveDate>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

async fn save(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SaveActivityInput>,
) -> AppResult<ApiResponse<SaveOutcome>> {
    let outcome = state.activity_service.save(&user.id, req).await?;
    Ok(ApiResponse::ok(outcome))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DeleteActivityRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .activity_service
        .delete(&user.id, &req.activity_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListActivitiesRequest>,
) -> AppResult<ApiResponse<Vec<activity::Model>>> {
    let activities = match (req.date, req.from, req.to) {
        (Some(date), None, None) => state.activity_service.list_by_date(&user.id, date).await?,
        (None, Some(from), Some(to)) => {
            state
                .activity_service
                .list_range(&user.id, from, to)
                .await?
        }
        _ => {
            return Err(AppError::BadRequest(
                "pass either date or both from and to".to_string(),
            ));
        }
    };
    Ok(ApiResponse::ok(activities))
}

pub fn router() -> Router<AppState> {
    let writes = Router::new()
        .route("/save", post(save))
        .route("/delete", post(delete))
        .route_layer(middleware::from_fn(rate_limit_write_middleware));

    Router::new().merge(writes).route("/list", post(list))
}
