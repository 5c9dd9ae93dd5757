use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::extract::ApiKey;
use crate::api::server::AppState;
use crate::db::models::{MenuItem, MenuItemPatch, NewMenuItem};
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub available: Option<bool>,
}

pub async fn list(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<MenuItem>>, ApiError> {
    let items = if query.available.unwrap_or(false) {
        state.menu.fetch_available().await?
    } else {
        state.menu.fetch_all().await?
    };
    Ok(Json(items))
}

pub async fn create(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(item): Json<NewMenuItem>,
) -> Result<(StatusCode, Json<MenuItem>), ApiError> {
    let created = state.menu.create(&item).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<MenuItemPatch>,
) -> Result<Json<MenuItem>, ApiError> {
    Ok(Json(state.menu.update(&id, &patch).await?))
}

pub async fn delete(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.menu.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
