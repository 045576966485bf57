use axum::{Extension, Json, extract::State, http::StatusCode};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use ens_db::models::NotificationRow;
use ens_types::models::{Notification, NotificationBatch, NotificationType};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::extract::Params;
use crate::middleware::AuthUser;

pub async fn create_batch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<NotificationBatch>, ApiError> {
    let owner = user.user_id;
    let batch_id = state.run_db(move |db| db.create_batch(owner)).await?;

    Ok(Json(NotificationBatch { batch_id }))
}

/// Queue one notification per reachable group member, then hand each to the
/// notifier. Failed deliveries stay pending and can be cancelled.
pub async fn send_batch(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<Json<Vec<Uuid>>, ApiError> {
    let batch_id = params.id("batch_id", "notification batch")?;
    let owner = user.user_id;
    let pending = state
        .run_db(move |db| db.start_batch(owner, batch_id))
        .await?;

    let mut created = Vec::with_capacity(pending.len());
    let mut delivered = 0usize;
    for delivery in pending {
        created.push(delivery.notification_id);

        if let Err(e) = state
            .notifier
            .send(delivery.telegram_id, &delivery.message_text)
            .await
        {
            warn!("Delivery of notification {} failed: {:#}", delivery.notification_id, e);
            continue;
        }

        // The row may have been cancelled while the message was in flight.
        let id = delivery.notification_id;
        if let Err(e) = state
            .run_db(move |db| db.complete_notification(id, Utc::now()))
            .await
        {
            warn!("Notification {} delivered but not marked complete: {:?}", id, e);
            continue;
        }
        delivered += 1;
    }

    info!("Batch {}: delivered {}/{}", batch_id, delivered, created.len());
    Ok(Json(created))
}

pub async fn get_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<Json<Notification>, ApiError> {
    let id = params.id("notification_id", "notification")?;
    let owner = user.user_id;
    let row = state.run_db(move |db| db.get_notification(owner, id)).await?;

    Ok(Json(to_notification(row)?))
}

pub async fn get_all(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    list(&state, user, false).await
}

pub async fn get_pending(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Notification>>, ApiError> {
    list(&state, user, true).await
}

pub async fn cancel_notification(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    params: Params,
) -> Result<StatusCode, ApiError> {
    let id = params.id("notification_id", "notification")?;
    let owner = user.user_id;
    state
        .run_db(move |db| db.cancel_notification(owner, id))
        .await?;

    Ok(StatusCode::OK)
}

async fn list(state: &AppState, user: AuthUser, pending_only: bool) -> Result<Json<Vec<Notification>>, ApiError> {
    let owner = user.user_id;
    let rows = state
        .run_db(move |db| db.list_notifications(owner, pending_only))
        .await?;

    let notifications = rows
        .into_iter()
        .map(to_notification)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(notifications))
}

fn to_notification(row: NotificationRow) -> Result<Notification, ApiError> {
    let kind = NotificationType::parse(&row.kind)
        .ok_or_else(|| ApiError::internal(anyhow::anyhow!("unknown notification type {:?}", row.kind)))?;

    Ok(Notification {
        notification_id: row.notification_id,
        batch_id: row.batch_id,
        recipient_id: row.recipient_id,
        recipient_group_id: row.recipient_group_id,
        kind,
        creation_timestamp: row.creation_timestamp,
        completion_timestamp: row.completion_timestamp,
    })
}
