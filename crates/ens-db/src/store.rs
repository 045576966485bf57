//! Generic draft/entity storage shared by every `Kind`.

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;
use uuid::Uuid;

use crate::kinds::{Kind, read_uuid};
use crate::models::Record;
use crate::{Database, Result, StoreError};

impl Database {
    // -- Drafts --

    pub fn insert_draft<K: Kind>(&self, owner: Uuid, fields: &K::Fields) -> Result<Record<K::Fields>> {
        let draft_id = Uuid::now_v7();
        self.with_conn(|conn| {
            insert_row(conn, K::DRAFT_TABLE, K::DRAFT_ID_COLUMN, K::COLUMNS, draft_id, owner, K::bind(fields))
        })?;
        debug!("Created {} {}", K::DRAFT_LABEL, draft_id);

        Ok(Record {
            id: draft_id,
            owner,
            fields: fields.clone(),
        })
    }

    /// Promote a draft to a committed row. Deleting the draft and inserting
    /// the entity happen in one transaction, so a draft is consumed at most
    /// once and never without its entity.
    pub fn confirm_draft<K: Kind>(&self, owner: Uuid, draft_id: Uuid) -> Result<Record<K::Fields>> {
        let record = self.with_tx(|tx| {
            ensure_owner(tx, K::DRAFT_TABLE, K::DRAFT_ID_COLUMN, K::DRAFT_LABEL, draft_id, owner)?;
            let draft = select_one::<K>(tx, K::DRAFT_TABLE, K::DRAFT_ID_COLUMN, K::DRAFT_LABEL, draft_id)?;

            K::check_references(tx, owner, &draft.fields)?;

            let entity_id = Uuid::now_v7();
            insert_row(tx, K::TABLE, K::ID_COLUMN, K::COLUMNS, entity_id, owner, K::bind(&draft.fields))?;

            let deleted = tx.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", K::DRAFT_TABLE, K::DRAFT_ID_COLUMN),
                [draft_id.to_string()],
            )?;
            if deleted != 1 {
                return Err(StoreError::NotFound(K::DRAFT_LABEL));
            }

            Ok(Record {
                id: entity_id,
                owner,
                fields: draft.fields,
            })
        })?;

        debug!("Confirmed {} {} as {} {}", K::DRAFT_LABEL, draft_id, K::LABEL, record.id);
        Ok(record)
    }

    // -- Committed entities --

    pub fn get_entity<K: Kind>(&self, owner: Uuid, id: Uuid) -> Result<Record<K::Fields>> {
        self.with_conn(|conn| {
            ensure_owner(conn, K::TABLE, K::ID_COLUMN, K::LABEL, id, owner)?;
            select_one::<K>(conn, K::TABLE, K::ID_COLUMN, K::LABEL, id)
        })
    }

    pub fn list_entities<K: Kind>(&self, owner: Uuid) -> Result<Vec<Record<K::Fields>>> {
        self.with_conn(|conn| select_owned::<K>(conn, owner, None))
    }

    pub fn update_entity<K: Kind>(&self, owner: Uuid, id: Uuid, fields: &K::Fields) -> Result<Record<K::Fields>> {
        self.with_tx(|tx| {
            ensure_owner(tx, K::TABLE, K::ID_COLUMN, K::LABEL, id, owner)?;
            K::check_references(tx, owner, fields)?;

            let assignments: Vec<String> = K::COLUMNS
                .iter()
                .enumerate()
                .map(|(i, col)| format!("{} = ?{}", col, i + 1))
                .collect();
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?{}",
                K::TABLE,
                assignments.join(", "),
                K::ID_COLUMN,
                K::COLUMNS.len() + 1
            );

            let mut values = K::bind(fields);
            values.push(Value::Text(id.to_string()));
            tx.execute(&sql, params_from_iter(values))?;

            Ok(Record {
                id,
                owner,
                fields: fields.clone(),
            })
        })
    }

    pub fn delete_entity<K: Kind>(&self, owner: Uuid, id: Uuid) -> Result<()> {
        self.with_tx(|tx| {
            ensure_owner(tx, K::TABLE, K::ID_COLUMN, K::LABEL, id, owner)?;
            // Memberships and notifications go with it via ON DELETE CASCADE.
            tx.execute(
                &format!("DELETE FROM {} WHERE {} = ?1", K::TABLE, K::ID_COLUMN),
                [id.to_string()],
            )?;
            Ok(())
        })?;

        debug!("Deleted {} {}", K::LABEL, id);
        Ok(())
    }
}

/// `NotFound` if the row does not exist, `NotOwner` if it belongs to
/// someone else.
pub(crate) fn ensure_owner(
    conn: &Connection,
    table: &str,
    id_column: &str,
    label: &'static str,
    id: Uuid,
    owner: Uuid,
) -> Result<()> {
    let sql = format!("SELECT master_id FROM {} WHERE {} = ?1", table, id_column);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id.to_string()])?;

    let Some(row) = rows.next()? else {
        return Err(StoreError::NotFound(label));
    };
    if read_uuid(row, 0)? != owner {
        return Err(StoreError::NotOwner(label));
    }
    Ok(())
}

/// Filtered on `master_id` first; `filter` is an extra SQL predicate on the
/// kind's own columns.
pub(crate) fn select_owned<K: Kind>(
    conn: &Connection,
    owner: Uuid,
    filter: Option<&str>,
) -> Result<Vec<Record<K::Fields>>> {
    let mut sql = format!(
        "SELECT {}, master_id, {} FROM {} WHERE master_id = ?1",
        K::ID_COLUMN,
        K::COLUMNS.join(", "),
        K::TABLE
    );
    if let Some(filter) = filter {
        sql.push_str(" AND ");
        sql.push_str(filter);
    }
    sql.push_str(" ORDER BY rowid");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([owner.to_string()], |row| {
            Ok(Record {
                id: read_uuid(row, 0)?,
                owner: read_uuid(row, 1)?,
                fields: K::read(row, 2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn select_one<K: Kind>(
    conn: &Connection,
    table: &str,
    id_column: &str,
    label: &'static str,
    id: Uuid,
) -> Result<Record<K::Fields>> {
    let sql = format!(
        "SELECT {}, master_id, {} FROM {} WHERE {} = ?1",
        id_column,
        K::COLUMNS.join(", "),
        table,
        id_column
    );

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Err(StoreError::NotFound(label));
    };

    Ok(Record {
        id: read_uuid(row, 0)?,
        owner: read_uuid(row, 1)?,
        fields: K::read(row, 2)?,
    })
}

fn insert_row(
    conn: &Connection,
    table: &str,
    id_column: &str,
    columns: &[&str],
    id: Uuid,
    owner: Uuid,
    values: Vec<Value>,
) -> Result<()> {
    let placeholders: Vec<String> = (1..=columns.len() + 2).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "INSERT INTO {} ({}, master_id, {}) VALUES ({})",
        table,
        id_column,
        columns.join(", "),
        placeholders.join(", ")
    );

    let mut params = Vec::with_capacity(values.len() + 2);
    params.push(Value::Text(id.to_string()));
    params.push(Value::Text(owner.to_string()));
    params.extend(values);

    conn.execute(&sql, params_from_iter(params))?;
    Ok(())
}
