//! Tile catalog and layout endpoints.

use axum::{Json, Router, extract::State, middleware, routing::post};
use habitgrid_common::AppResult;
use habitgrid_core::{
    CreateCustomTileInput, LayoutEntry, TileSize, UpdateCustomTileInput,
    services::tile::PredefinedTile,
};
use habitgrid_db::entities::custom_tile;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser, middleware::AppState, rate_limit::rate_limit_write_middleware,
    response::ApiResponse,
};

/// Built-in tiles plus the user's own.
#[derive(Serialize)]
pub struct CatalogResponse {
    pub predefined: &'static [PredefinedTile],
    pub custom: Vec<custom_tile::Model>,
}

/// Request naming one tile.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileIdRequest {
    pub tile_id: String,
}

/// Replace layout request.
#[derive(Debug, Deserialize)]
pub struct ReplaceLayoutRequest {
    pub entries: Vec<LayoutEntry>,
}

/// Move request: indices into the current layout.
#[derive(Debug, Deserialize)]
pub struct MoveTileRequest {
    pub from: usize,
    pub to: usize,
}

/// Resize request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeTileRequest {
    pub tile_id: String,
    pub size: TileSize,
}

/// Visibility request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub tile_id: String,
    pub hidden: bool,
}

async fn catalog(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CatalogResponse>> {
    let custom = state.tile_service.list_custom(&user.id).await?;
    Ok(ApiResponse::ok(CatalogResponse {
        predefined: state.tile_service.catalog(),
        custom,
    }))
}

async fn create_custom(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateCustomTileInput>,
) -> AppResult<ApiResponse<custom_tile::Model>> {
    let tile = state.tile_service.create_custom(&user.id, req).await?;
    Ok(ApiResponse::ok(tile))
}

async fn update_custom(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateCustomTileInput>,
) -> AppResult<ApiResponse<custom_tile::Model>> {
    let tile = state.tile_service.update_custom(&user.id, req).await?;
    Ok(ApiResponse::ok(tile))
}

async fn delete_custom(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<TileIdRequest>,
) -> AppResult<ApiResponse<()>> {
    state
        .tile_service
        .delete_custom(&user.id, &req.tile_id)
        .await?;
    Ok(ApiResponse::ok(()))
}

async fn layout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<LayoutEntry>>> {
    Ok(ApiResponse::ok(state.tile_service.get_layout(&user.id).await?))
}

async fn replace_layout(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReplaceLayoutRequest>,
) -> AppResult<ApiResponse<Vec<LayoutEntry>>> {
    let layout = state
        .tile_service
        .replace_layout(&user.id, req.entries)
        .await?;
    Ok(ApiResponse::ok(layout))
}

async fn move_tile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MoveTileRequest>,
) -> AppResult<ApiResponse<Vec<LayoutEntry>>> {
    let layout = state
        .tile_service
        .move_tile(&user.id, req.from, req.to)
        .await?;
    Ok(ApiResponse::ok(layout))
}

async fn resize_tile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ResizeTileRequest>,
) -> AppResult<ApiResponse<Vec<LayoutEntry>>> {
    let layout = state
        .tile_service
        .resize_tile(&user.id, &req.tile_id, req.size)
        .await?;
    Ok(ApiResponse::ok(layout))
}

async fn set_visibility(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<VisibilityRequest>,
) -> AppResult<ApiResponse<Vec<LayoutEntry>>> {
    let layout = state
        .tile_service
        .set_visibility(&user.id, &req.tile_id, req.hidden)
        .await?;
    Ok(ApiResponse::ok(layout))
}

pub fn router() -> Router<AppState> {
    let writes = Router::new()
        .route("/custom/create", post(create_custom))
        .route("/custom/update", post(update_custom))
        .route("/custom/delete", post(delete_custom))
        .route("/layout/replace", post(replace_layout))
        .route("/layout/move", post(move_tile))
        .route("/layout/resize", post(resize_tile))
        .route("/layout/visibility", post(set_visibility))
        .route_layer(middleware::from_fn(rate_limit_write_middleware));

    Router::new()
        .merge(writes)
        .route("/catalog", post(catalog))
        .route("/layout", post(layout))
}
