use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (users, drafts, entities, memberships)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                user_id         TEXT PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE sessions (
                session_id  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX idx_sessions_user ON sessions(user_id);

            CREATE TABLE recipient_draft (
                recipient_draft_id  TEXT PRIMARY KEY,
                master_id           TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                name                TEXT NOT NULL,
                email               TEXT,
                phone_number        TEXT,
                telegram_id         INTEGER
            );

            CREATE TABLE recipient (
                recipient_id    TEXT PRIMARY KEY,
                master_id       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                email           TEXT,
                phone_number    TEXT,
                telegram_id     INTEGER
            );

            CREATE INDEX idx_recipient_master ON recipient(master_id);

            CREATE TABLE notification_template_draft (
                notification_template_draft_id  TEXT PRIMARY KEY,
                master_id                       TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                name                            TEXT NOT NULL,
                message_text                    TEXT
            );

            CREATE TABLE notification_template (
                notification_template_id    TEXT PRIMARY KEY,
                master_id                   TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                name                        TEXT NOT NULL,
                message_text                TEXT
            );

            CREATE INDEX idx_template_master ON notification_template(master_id);

            -- template_id is only checked when the draft is confirmed
            CREATE TABLE recipient_group_draft (
                recipient_group_draft_id    TEXT PRIMARY KEY,
                master_id                   TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                name                        TEXT NOT NULL,
                active                      INTEGER NOT NULL,
                template_id                 TEXT
            );

            CREATE TABLE recipient_group (
                recipient_group_id  TEXT PRIMARY KEY,
                master_id           TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                name                TEXT NOT NULL,
                active              INTEGER NOT NULL,
                template_id         TEXT REFERENCES notification_template(notification_template_id)
                                        ON DELETE SET NULL
            );

            CREATE INDEX idx_group_master ON recipient_group(master_id, active);

            CREATE TABLE recipient_recipient_group (
                recipient_group_id  TEXT NOT NULL REFERENCES recipient_group(recipient_group_id)
                                        ON DELETE CASCADE,
                recipient_id        TEXT NOT NULL REFERENCES recipient(recipient_id)
                                        ON DELETE CASCADE,
                PRIMARY KEY (recipient_group_id, recipient_id)
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (notification batches)");
        conn.execute_batch(
            "
            CREATE TABLE notifications_batch (
                batch_id    TEXT PRIMARY KEY,
                master_id   TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
                sent        INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE notification (
                notification_id         TEXT PRIMARY KEY,
                batch_id                TEXT NOT NULL REFERENCES notifications_batch(batch_id)
                                            ON DELETE CASCADE,
                recipient_id            TEXT NOT NULL REFERENCES recipient(recipient_id)
                                            ON DELETE CASCADE,
                recipient_group_id      TEXT NOT NULL REFERENCES recipient_group(recipient_group_id)
                                            ON DELETE CASCADE,
                type                    TEXT NOT NULL,
                creation_timestamp      TEXT NOT NULL,
                completion_timestamp    TEXT
            );

            CREATE INDEX idx_notification_batch ON notification(batch_id);

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    if version < 3 {
        info!("Running migration v3 (session expiry, telegram contacts)");
        conn.execute_batch(
            "
            -- unix seconds; NULL for sessions opened before expiry was tracked
            ALTER TABLE sessions ADD COLUMN expires_at INTEGER;

            -- chats that messaged the bot; only active ones receive deliveries
            CREATE TABLE telegram_contact (
                telegram_id     INTEGER PRIMARY KEY,
                active          INTEGER NOT NULL,
                updated_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            INSERT INTO schema_version (version) VALUES (3);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
