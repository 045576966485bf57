use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

use ens_types::models::{GroupFields, RecipientFields};

use crate::error::conflict_on_unique;
use crate::kinds::{Groups, Kind, Recipients, read_uuid};
use crate::models::{Record, UserRow};
use crate::store::select_owned;
use crate::{Database, Result, StoreError};

impl Database {
    // -- Users --

    pub fn create_user(&self, user_id: Uuid, name: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, name, password_hash) VALUES (?1, ?2, ?3)",
                (user_id.to_string(), name, password_hash),
            )
            .map_err(conflict_on_unique("user"))?;
            Ok(())
        })
    }

    pub fn get_user_by_name(&self, name: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_name(conn, name))
    }

    pub fn update_user(&self, user_id: Uuid, name: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            let updated = conn
                .execute(
                    "UPDATE users SET name = ?1, password_hash = ?2 WHERE user_id = ?3",
                    (name, password_hash, user_id.to_string()),
                )
                .map_err(conflict_on_unique("user"))?;
            if updated == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })
    }

    /// Drafts, entities, sessions and batches owned by the user go with it.
    pub fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            let deleted = tx.execute("DELETE FROM users WHERE user_id = ?1", [user_id.to_string()])?;
            if deleted == 0 {
                return Err(StoreError::NotFound("user"));
            }
            Ok(())
        })?;

        debug!("Deleted user {}", user_id);
        Ok(())
    }

    // -- Sessions --

    /// Open a session for `user_id` that lapses at `expires_at`. The user's
    /// already lapsed sessions are dropped in the same transaction.
    pub fn create_session(&self, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<Uuid> {
        let session_id = Uuid::now_v7();
        self.with_tx(|tx| {
            prune_sessions(tx, user_id)?;
            insert_session(tx, session_id, user_id, expires_at)
        })?;
        Ok(session_id)
    }

    /// A session is live while its row exists and has not lapsed. Deleting
    /// the user removes it.
    pub fn session_is_live(&self, session_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let live = conn.query_row(
                "SELECT EXISTS (
                    SELECT 1 FROM sessions
                    WHERE session_id = ?1 AND user_id = ?2
                      AND (expires_at IS NULL OR expires_at > ?3)
                 )",
                (session_id.to_string(), user_id.to_string(), Utc::now().timestamp()),
                |row| row.get(0),
            )?;
            Ok(live)
        })
    }

    /// Replace a session with a fresh one lapsing at `expires_at`. `NotFound`
    /// if the old session is already gone or has lapsed.
    pub fn rotate_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let new_id = Uuid::now_v7();
        self.with_tx(|tx| {
            prune_sessions(tx, user_id)?;
            let deleted = tx.execute(
                "DELETE FROM sessions WHERE session_id = ?1 AND user_id = ?2",
                (session_id.to_string(), user_id.to_string()),
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound("session"));
            }
            insert_session(tx, new_id, user_id, expires_at)
        })?;
        Ok(new_id)
    }

    // -- Groups --

    pub fn list_active_groups(&self, owner: Uuid) -> Result<Vec<Record<GroupFields>>> {
        self.with_conn(|conn| select_owned::<Groups>(conn, owner, Some("active = 1")))
    }

    // -- Memberships --
    //
    // Unlike the id-addressed entity operations, a group or recipient that
    // belongs to someone else is reported as not found here.

    pub fn add_group_member(&self, owner: Uuid, group_id: Uuid, recipient_id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            ensure_owned::<Groups>(tx, owner, group_id)?;
            ensure_owned::<Recipients>(tx, owner, recipient_id)?;

            tx.execute(
                "INSERT INTO recipient_recipient_group (recipient_group_id, recipient_id) VALUES (?1, ?2)",
                (group_id.to_string(), recipient_id.to_string()),
            )
            .map_err(conflict_on_unique("group membership"))?;
            Ok(())
        })?;

        debug!("Added recipient {} to group {}", recipient_id, group_id);
        Ok(())
    }

    pub fn remove_group_member(&self, owner: Uuid, group_id: Uuid, recipient_id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            ensure_owned::<Groups>(tx, owner, group_id)?;
            ensure_owned::<Recipients>(tx, owner, recipient_id)?;

            let deleted = tx.execute(
                "DELETE FROM recipient_recipient_group WHERE recipient_group_id = ?1 AND recipient_id = ?2",
                (group_id.to_string(), recipient_id.to_string()),
            )?;
            if deleted == 0 {
                return Err(StoreError::NotFound("group membership"));
            }
            Ok(())
        })?;

        debug!("Removed recipient {} from group {}", recipient_id, group_id);
        Ok(())
    }

    pub fn group_members(&self, owner: Uuid, group_id: Uuid) -> Result<Vec<Record<RecipientFields>>> {
        self.with_conn(|conn| {
            ensure_owned::<Groups>(conn, owner, group_id)?;

            let mut stmt = conn.prepare(
                "SELECT r.recipient_id, r.master_id, r.name, r.email, r.phone_number, r.telegram_id
                 FROM recipient_recipient_group m
                 INNER JOIN recipient r ON r.recipient_id = m.recipient_id
                 WHERE m.recipient_group_id = ?1
                 ORDER BY m.rowid",
            )?;

            let rows = stmt
                .query_map([group_id.to_string()], |row| {
                    Ok(Record {
                        id: read_uuid(row, 0)?,
                        owner: read_uuid(row, 1)?,
                        fields: Recipients::read(row, 2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

fn ensure_owned<K: Kind>(conn: &Connection, owner: Uuid, id: Uuid) -> Result<()> {
    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = ?1 AND master_id = ?2)",
        K::TABLE,
        K::ID_COLUMN
    );
    let owned: bool = conn.query_row(&sql, (id.to_string(), owner.to_string()), |row| row.get(0))?;
    if owned {
        Ok(())
    } else {
        Err(StoreError::NotFound(K::LABEL))
    }
}

fn insert_session(
    conn: &Connection,
    session_id: Uuid,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO sessions (session_id, user_id, expires_at) VALUES (?1, ?2, ?3)",
        (session_id.to_string(), user_id.to_string(), expires_at.timestamp()),
    )?;
    Ok(())
}

fn prune_sessions(conn: &Connection, user_id: Uuid) -> Result<()> {
    let pruned = conn.execute(
        "DELETE FROM sessions WHERE user_id = ?1 AND expires_at <= ?2",
        (user_id.to_string(), Utc::now().timestamp()),
    )?;
    if pruned > 0 {
        debug!("Pruned {} lapsed sessions for user {}", pruned, user_id);
    }
    Ok(())
}

fn query_user_by_name(conn: &Connection, name: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare("SELECT user_id, name, password_hash FROM users WHERE name = ?1")?;
    let mut rows = stmt.query([name])?;

    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    Ok(Some(UserRow {
        user_id: read_uuid(row, 0)?,
        name: row.get(1)?,
        password_hash: row.get(2)?,
    }))
}
