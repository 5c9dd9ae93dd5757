use axum::{
    extract::{FromRequestParts, Query},
    http::{Uri, header, request::Parts},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::server::AppState;
use crate::error::ApiError;

const API_KEY_HEADER: &str = "apikey";

/// Proof the caller presented the project's public key, either as an
/// `apikey` header or (for websocket upgrades) an `apikey` query parameter.
pub struct ApiKey;

impl FromRequestParts<Arc<AppState>> for ApiKey {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| query_key(&parts.uri));

        match presented {
            Some(key) if state.backend.verify_api_key(&key) => Ok(ApiKey),
            Some(_) => Err(ApiError::Unauthorized("Invalid API key".to_string())),
            None => Err(ApiError::Unauthorized("No API key found in request".to_string())),
        }
    }
}

/// Access token from an `Authorization: Bearer …` header.
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| BearerToken(t.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))
    }
}

#[derive(Deserialize)]
struct KeyParams {
    apikey: Option<String>,
}

fn query_key(uri: &Uri) -> Option<String> {
    let Query(params) = Query::<KeyParams>::try_from_uri(uri).ok()?;
    params.apikey.filter(|key| !key.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_in(uri: &str) -> Option<String> {
        query_key(&uri.parse::<Uri>().unwrap())
    }

    #[test]
    fn test_query_key() {
        assert_eq!(key_in("/api/realtime?vsn=1.0.0&apikey=abc").as_deref(), Some("abc"));
        assert_eq!(key_in("/api/realtime?apikey=a%2Bb%3D%26c").as_deref(), Some("a+b=&c"));
        assert_eq!(key_in("/api/realtime?apikeyx=abc"), None);
        assert_eq!(key_in("/api/realtime?apikey="), None);
        assert_eq!(key_in("/api/realtime"), None);
    }
}
