//! Telegram chats that asked the bot for notifications. A recipient's
//! `telegram_id` only receives deliveries while its chat is active here.

use tracing::debug;

use crate::{Database, Result};

impl Database {
    /// Opt a chat in. `false` if it was already active.
    pub fn activate_contact(&self, telegram_id: i64) -> Result<bool> {
        let changed = self.with_conn(|conn| {
            let changed = conn.execute(
                "INSERT INTO telegram_contact (telegram_id, active) VALUES (?1, 1)
                 ON CONFLICT (telegram_id) DO UPDATE
                    SET active = 1, updated_at = datetime('now')
                    WHERE active = 0",
                [telegram_id],
            )?;
            Ok(changed > 0)
        })?;

        if changed {
            debug!("Telegram chat {} opted in", telegram_id);
        }
        Ok(changed)
    }

    /// Opt a chat out. `false` if it was not active.
    pub fn deactivate_contact(&self, telegram_id: i64) -> Result<bool> {
        let changed = self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE telegram_contact SET active = 0, updated_at = datetime('now')
                 WHERE telegram_id = ?1 AND active = 1",
                [telegram_id],
            )?;
            Ok(changed > 0)
        })?;

        if changed {
            debug!("Telegram chat {} opted out", telegram_id);
        }
        Ok(changed)
    }

    pub fn contact_is_active(&self, telegram_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let active = conn.query_row(
                "SELECT EXISTS (SELECT 1 FROM telegram_contact WHERE telegram_id = ?1 AND active = 1)",
                [telegram_id],
                |row| row.get(0),
            )?;
            Ok(active)
        })
    }
}
