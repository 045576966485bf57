//! Row shapes returned by the store. The HTTP-facing shapes live in
//! `ens_types::models`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct UserRow {
    pub user_id: Uuid,
    pub name: String,
    pub password_hash: String,
}

/// A draft or committed row of some `Kind`: its id, its owner, and the
/// kind's own columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<F> {
    pub id: Uuid,
    pub owner: Uuid,
    pub fields: F,
}

pub struct NotificationRow {
    pub notification_id: Uuid,
    pub batch_id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_group_id: Uuid,
    pub kind: String,
    pub creation_timestamp: DateTime<Utc>,
    pub completion_timestamp: Option<DateTime<Utc>>,
}

/// A notification row created by `start_batch` that still has to be handed
/// to a notifier.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    pub notification_id: Uuid,
    pub telegram_id: i64,
    pub message_text: String,
}
