use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use ens_types::api::TokenKind;

use crate::auth::AppState;
use crate::error::ApiError;

/// The caller resolved from a live access token. Inserted into request
/// extensions by `require_auth`.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: Uuid,
}

/// Resolve the `Authorization` header to a live session or reject with 401.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = bearer_token(req.headers())
        .and_then(|token| state.tokens.verify(token, TokenKind::Access))
        .ok_or(ApiError::Unauthenticated)?;

    let (session_id, user_id) = (claims.sid, claims.sub);
    let live = state
        .run_db(move |db| db.session_is_live(session_id, user_id))
        .await?;
    if !live {
        return Err(ApiError::Unauthenticated);
    }

    req.extensions_mut().insert(AuthUser { user_id });
    Ok(next.run(req).await)
}

/// Accepts both `Bearer <token>` and a bare token.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_prefix_is_optional() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("abc.def")), Some("abc.def"));
    }

    #[test]
    fn empty_or_missing_header_yields_nothing() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("")), None);
    }
}
