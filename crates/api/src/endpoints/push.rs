//! Web push endpoints.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    routing::post,
};
use habitgrid_common::AppResult;
use habitgrid_core::{
    PushConfigResponse, PushPreferences, PushSubscriptionResponse, SubscribeInput,
    UpdatePreferencesInput,
};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Unsubscribe request.
#[derive(Debug, Deserialize)]
pub struct UnsubscribeRequest {
    pub endpoint: String,
}

/// VAPID public key for `PushManager.subscribe`. Needs no session.
async fn config(State(state): State<AppState>) -> ApiResponse<PushConfigResponse> {
    ApiResponse::ok(state.push_service.config())
}

async fn subscribe(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubscribeInput>,
) -> AppResult<ApiResponse<PushSubscriptionResponse>> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    let subscription = state
        .push_service
        .subscribe(&user.id, req, user_agent)
        .await?;
    Ok(ApiResponse::ok(subscription))
}

async fn unsubscribe(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UnsubscribeRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .push_service
        .unsubscribe(&user.id, &req.endpoint)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn subscriptions(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<PushSubscriptionResponse>>> {
    Ok(ApiResponse::ok(state.push_service.list(&user.id).await?))
}

async fn preferences(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<PushPreferences>> {
    Ok(ApiResponse::ok(
        state.push_service.preferences(&user.id).await?,
    ))
}

async fn update_preferences(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdatePreferencesInput>,
) -> AppResult<ApiResponse<PushPreferences>> {
    let preferences = state
        .push_service
        .update_preferences(&user.id, req)
        .await?;
    Ok(ApiResponse::ok(preferences))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/config", post(config).get(config))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/subscriptions", post(subscriptions))
        .route("/preferences", post(preferences))
        .route("/preferences/update", post(update_preferences))
}
