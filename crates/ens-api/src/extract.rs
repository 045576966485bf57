use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::ApiError;

/// JSON body extractor that ignores `Content-Type` and reports every
/// parse failure (syntax, unknown field, missing field, wrong type) as 422.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::Validation(e.body_text()))?;

        serde_json::from_slice(&bytes)
            .map(Payload)
            .map_err(|e| ApiError::Validation(e.to_string()))
    }
}

/// Raw query string parameters. Ids are looked up by name and a missing or
/// malformed id is reported as "not found".
pub struct Params(HashMap<String, String>);

impl<S> FromRequestParts<S> for Params
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(map) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map_err(|_| ApiError::NotFound("malformed query string".to_string()))?;
        Ok(Params(map))
    }
}

impl Params {
    pub fn id(&self, key: &str, label: &str) -> Result<Uuid, ApiError> {
        self.0
            .get(key)
            .and_then(|raw| raw.trim().parse().ok())
            .ok_or_else(|| ApiError::not_found(label))
    }
}
