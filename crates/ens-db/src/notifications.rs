//! Notification batches and per-recipient notification rows.
//!
//! A notification belongs to whoever owns its batch.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use tracing::{debug, info};
use uuid::Uuid;

use ens_types::models::NotificationType;

use crate::kinds::read_uuid;
use crate::models::{NotificationRow, PendingDelivery};
use crate::{Database, Result, StoreError};

const NOTIFICATION_COLUMNS: &str = "n.notification_id, n.batch_id, n.recipient_id, n.recipient_group_id, \
     n.type, n.creation_timestamp, n.completion_timestamp";

impl Database {
    pub fn create_batch(&self, owner: Uuid) -> Result<Uuid> {
        let batch_id = Uuid::now_v7();
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications_batch (batch_id, master_id) VALUES (?1, ?2)",
                (batch_id.to_string(), owner.to_string()),
            )?;
            Ok(())
        })?;
        debug!("Created notification batch {}", batch_id);
        Ok(batch_id)
    }

    /// Mark a batch sent and create one pending notification per
    /// (active group, member recipient) pair that can actually be delivered:
    /// the group's template has text and the recipient's chat has opted in.
    /// `NotFound` unless the batch exists, is the caller's and is unsent.
    pub fn start_batch(&self, owner: Uuid, batch_id: Uuid) -> Result<Vec<PendingDelivery>> {
        let now = Utc::now();
        let pending = self.with_tx(|tx| {
            let claimed = tx.execute(
                "UPDATE notifications_batch SET sent = 1
                 WHERE batch_id = ?1 AND master_id = ?2 AND sent = 0",
                (batch_id.to_string(), owner.to_string()),
            )?;
            if claimed == 0 {
                return Err(StoreError::NotFound("notification batch"));
            }

            let targets = {
                let mut stmt = tx.prepare(
                    "SELECT g.recipient_group_id, r.recipient_id, r.telegram_id, t.message_text
                     FROM recipient_group g
                     INNER JOIN notification_template t ON t.notification_template_id = g.template_id
                     INNER JOIN recipient_recipient_group m ON m.recipient_group_id = g.recipient_group_id
                     INNER JOIN recipient r ON r.recipient_id = m.recipient_id
                     INNER JOIN telegram_contact c ON c.telegram_id = r.telegram_id
                     WHERE g.master_id = ?1
                       AND g.active = 1
                       AND t.message_text IS NOT NULL
                       AND c.active = 1
                     ORDER BY g.rowid, m.rowid",
                )?;
                stmt.query_map([owner.to_string()], |row| {
                    Ok((
                        read_uuid(row, 0)?,
                        read_uuid(row, 1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?
            };

            let mut pending = Vec::with_capacity(targets.len());
            for (group_id, recipient_id, telegram_id, message_text) in targets {
                let notification_id = Uuid::now_v7();
                tx.execute(
                    "INSERT INTO notification
                        (notification_id, batch_id, recipient_id, recipient_group_id, type, creation_timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    (
                        notification_id.to_string(),
                        batch_id.to_string(),
                        recipient_id.to_string(),
                        group_id.to_string(),
                        NotificationType::Telegram.as_str(),
                        now,
                    ),
                )?;
                pending.push(PendingDelivery {
                    notification_id,
                    telegram_id,
                    message_text,
                });
            }
            Ok(pending)
        })?;

        info!("Batch {} queued {} notifications", batch_id, pending.len());
        Ok(pending)
    }

    pub fn complete_notification(&self, notification_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE notification SET completion_timestamp = ?1
                 WHERE notification_id = ?2 AND completion_timestamp IS NULL",
                (at, notification_id.to_string()),
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound("notification"));
            }
            Ok(())
        })
    }

    pub fn get_notification(&self, owner: Uuid, notification_id: Uuid) -> Result<NotificationRow> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS}
                 FROM notification n
                 INNER JOIN notifications_batch b ON b.batch_id = n.batch_id
                 WHERE n.notification_id = ?1 AND b.master_id = ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query((notification_id.to_string(), owner.to_string()))?;
            match rows.next()? {
                Some(row) => Ok(read_notification(row)?),
                None => Err(StoreError::NotFound("notification")),
            }
        })
    }

    pub fn list_notifications(&self, owner: Uuid, pending_only: bool) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| select_notifications(conn, owner, pending_only))
    }

    /// Only a notification that has not been delivered yet can be cancelled.
    pub fn cancel_notification(&self, owner: Uuid, notification_id: Uuid) -> Result<()> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM notification
                 WHERE notification_id = ?1
                   AND completion_timestamp IS NULL
                   AND batch_id IN (SELECT batch_id FROM notifications_batch WHERE master_id = ?2)",
                (notification_id.to_string(), owner.to_string()),
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound("notification"));
            }
            Ok(())
        })?;

        debug!("Cancelled notification {}", notification_id);
        Ok(())
    }
}

fn select_notifications(conn: &Connection, owner: Uuid, pending_only: bool) -> Result<Vec<NotificationRow>> {
    let mut sql = format!(
        "SELECT {NOTIFICATION_COLUMNS}
         FROM notification n
         INNER JOIN notifications_batch b ON b.batch_id = n.batch_id
         WHERE b.master_id = ?1"
    );
    if pending_only {
        sql.push_str(" AND n.completion_timestamp IS NULL");
    }
    sql.push_str(" ORDER BY n.rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([owner.to_string()], read_notification)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn read_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        notification_id: read_uuid(row, 0)?,
        batch_id: read_uuid(row, 1)?,
        recipient_id: read_uuid(row, 2)?,
        recipient_group_id: read_uuid(row, 3)?,
        kind: row.get(4)?,
        creation_timestamp: row.get(5)?,
        completion_timestamp: row.get(6)?,
    })
}
