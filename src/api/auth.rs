use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::extract::{ApiKey, BearerToken};
use crate::api::server::AppState;
use crate::backend::{Session, User};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub async fn sign_up(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .backend
        .auth_client(None)
        .sign_up(&payload.email, &payload.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn token(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    Json(payload): Json<Credentials>,
) -> Result<Json<Session>, ApiError> {
    let session = state
        .backend
        .auth_client(None)
        .sign_in_with_password(&payload.email, &payload.password)
        .await?;
    Ok(Json(session))
}

pub async fn logout(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, ApiError> {
    state.backend.auth_client(Some(token)).sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn session(
    _key: ApiKey,
    State(state): State<Arc<AppState>>,
    BearerToken(token): BearerToken,
) -> Result<Json<Session>, ApiError> {
    state
        .backend
        .auth_client(Some(token))
        .get_session()
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Auth session missing".to_string()))
}
