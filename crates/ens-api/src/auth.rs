use std::sync::Arc;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::{HeaderMap, StatusCode}};
use tracing::{error, info};
use uuid::Uuid;

use ens_db::Database;
use ens_types::api::{Credentials, TokenKind, TokenPair};

use crate::error::ApiError;
use crate::extract::Payload;
use crate::middleware::{AuthUser, bearer_token};
use crate::notifier::Notifier;
use crate::tokens::TokenService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub notifier: Box<dyn Notifier>,
    /// Expected value of the Telegram webhook secret header, if any.
    pub webhook_secret: Option<String>,
}

impl AppStateInner {
    /// Run a store call on the blocking pool.
    pub async fn run_db<F, T>(self: &Arc<Self>, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Database) -> ens_db::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .map_err(|e| {
                error!("spawn_blocking join error: {}", e);
                ApiError::internal(e)
            })?
            .map_err(ApiError::from)
    }

    async fn open_session(self: &Arc<Self>, user_id: Uuid) -> Result<TokenPair, ApiError> {
        let expires_at = self.tokens.session_expiry().map_err(ApiError::Internal)?;
        let session_id = self
            .run_db(move |db| db.create_session(user_id, expires_at))
            .await?;
        self.tokens
            .issue_pair(user_id, session_id)
            .map_err(ApiError::Internal)
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Payload(req): Payload<Credentials>,
) -> Result<Json<TokenPair>, ApiError> {
    let password_hash = hash_password(req.password).await?;

    let user_id = Uuid::now_v7();
    let name = req.name;
    state
        .run_db(move |db| db.create_user(user_id, &name, &password_hash))
        .await?;

    info!("Created user {}", user_id);
    Ok(Json(state.open_session(user_id).await?))
}

pub async fn login(
    State(state): State<AppState>,
    Payload(req): Payload<Credentials>,
) -> Result<Json<TokenPair>, ApiError> {
    let name = req.name;
    let user = state
        .run_db(move |db| db.get_user_by_name(&name))
        .await?
        .ok_or_else(|| ApiError::not_found("user"))?;

    if !verify_password(req.password, user.password_hash).await? {
        return Err(ApiError::Unauthenticated);
    }

    Ok(Json(state.open_session(user.user_id).await?))
}

pub async fn modify_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Payload(req): Payload<Credentials>,
) -> Result<StatusCode, ApiError> {
    let password_hash = hash_password(req.password).await?;

    let user_id = user.user_id;
    let name = req.name;
    state
        .run_db(move |db| db.update_user(user_id, &name, &password_hash))
        .await?;

    Ok(StatusCode::OK)
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<StatusCode, ApiError> {
    let user_id = user.user_id;
    state.run_db(move |db| db.delete_user(user_id)).await?;

    info!("Deleted user {}", user_id);
    Ok(StatusCode::OK)
}

/// Exchange a refresh token for a new pair. The old session is revoked, so
/// each refresh token works once and the old access token stops working
/// too. Any failure to resolve the token is 404.
pub async fn refresh_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenPair>, ApiError> {
    let invalid = || ApiError::not_found("refresh token");

    let claims = bearer_token(&headers)
        .and_then(|token| state.tokens.verify(token, TokenKind::Refresh))
        .ok_or_else(invalid)?;

    let (old_session, user_id) = (claims.sid, claims.sub);
    let expires_at = state.tokens.session_expiry().map_err(ApiError::Internal)?;
    let session_id = state
        .run_db(move |db| db.rotate_session(old_session, user_id, expires_at))
        .await
        .map_err(|e| match e {
            ApiError::NotFound(_) => invalid(),
            other => other,
        })?;

    let pair = state
        .tokens
        .issue_pair(user_id, session_id)
        .map_err(ApiError::Internal)?;
    Ok(Json(pair))
}

// -- Password hashing (Argon2id, on the blocking pool) --

async fn hash_password(password: String) -> Result<String, ApiError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::internal(e)
    })?
    .map_err(ApiError::Internal)
}

async fn verify_password(password: String, stored_hash: String) -> Result<bool, ApiError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| anyhow::anyhow!("stored password hash is unreadable: {}", e))?;
        Ok::<_, anyhow::Error>(
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
        )
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::internal(e)
    })?
    .map_err(ApiError::Internal)
}
