//! Per-entity descriptions consumed by the generic draft/entity store.
//!
//! Every kind has a draft table and a committed table with identical field
//! columns. Only the id column differs, which keeps the two id namespaces
//! apart: a draft id simply never matches a row in the committed table.

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use ens_types::models::{GroupFields, RecipientFields, TemplateFields};

use crate::{Result, StoreError};

pub trait Kind: Send + Sync + 'static {
    type Fields: Clone + Send + Sync + 'static;

    /// Used in error messages, e.g. "recipient not found".
    const LABEL: &'static str;
    const DRAFT_LABEL: &'static str;

    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    const DRAFT_TABLE: &'static str;
    const DRAFT_ID_COLUMN: &'static str;

    /// Field columns, in the order `bind` produces and `read` consumes them.
    const COLUMNS: &'static [&'static str];

    fn bind(fields: &Self::Fields) -> Vec<Value>;

    /// Read the field columns starting at `offset`.
    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self::Fields>;

    /// Checks run before a committed row is written (confirm and modify).
    fn check_references(_conn: &Connection, _owner: Uuid, _fields: &Self::Fields) -> Result<()> {
        Ok(())
    }
}

pub struct Recipients;
pub struct Templates;
pub struct Groups;

impl Kind for Recipients {
    type Fields = RecipientFields;

    const LABEL: &'static str = "recipient";
    const DRAFT_LABEL: &'static str = "recipient draft";
    const TABLE: &'static str = "recipient";
    const ID_COLUMN: &'static str = "recipient_id";
    const DRAFT_TABLE: &'static str = "recipient_draft";
    const DRAFT_ID_COLUMN: &'static str = "recipient_draft_id";
    const COLUMNS: &'static [&'static str] = &["name", "email", "phone_number", "telegram_id"];

    fn bind(fields: &RecipientFields) -> Vec<Value> {
        vec![
            Value::Text(fields.name.clone()),
            opt_text(&fields.email),
            opt_text(&fields.phone_number),
            fields.telegram_id.map_or(Value::Null, Value::Integer),
        ]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<RecipientFields> {
        Ok(RecipientFields {
            name: row.get(offset)?,
            email: row.get(offset + 1)?,
            phone_number: row.get(offset + 2)?,
            telegram_id: row.get(offset + 3)?,
        })
    }
}

impl Kind for Templates {
    type Fields = TemplateFields;

    const LABEL: &'static str = "notification template";
    const DRAFT_LABEL: &'static str = "notification template draft";
    const TABLE: &'static str = "notification_template";
    const ID_COLUMN: &'static str = "notification_template_id";
    const DRAFT_TABLE: &'static str = "notification_template_draft";
    const DRAFT_ID_COLUMN: &'static str = "notification_template_draft_id";
    const COLUMNS: &'static [&'static str] = &["name", "message_text"];

    fn bind(fields: &TemplateFields) -> Vec<Value> {
        vec![Value::Text(fields.name.clone()), opt_text(&fields.message_text)]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<TemplateFields> {
        Ok(TemplateFields {
            name: row.get(offset)?,
            message_text: row.get(offset + 1)?,
        })
    }
}

impl Kind for Groups {
    type Fields = GroupFields;

    const LABEL: &'static str = "recipient group";
    const DRAFT_LABEL: &'static str = "recipient group draft";
    const TABLE: &'static str = "recipient_group";
    const ID_COLUMN: &'static str = "recipient_group_id";
    const DRAFT_TABLE: &'static str = "recipient_group_draft";
    const DRAFT_ID_COLUMN: &'static str = "recipient_group_draft_id";
    const COLUMNS: &'static [&'static str] = &["name", "active", "template_id"];

    fn bind(fields: &GroupFields) -> Vec<Value> {
        vec![
            Value::Text(fields.name.clone()),
            Value::Integer(i64::from(fields.active)),
            fields
                .notification_template_id
                .map_or(Value::Null, |id| Value::Text(id.to_string())),
        ]
    }

    fn read(row: &Row<'_>, offset: usize) -> rusqlite::Result<GroupFields> {
        Ok(GroupFields {
            name: row.get(offset)?,
            active: row.get(offset + 1)?,
            notification_template_id: read_opt_uuid(row, offset + 2)?,
        })
    }

    /// The referenced template must exist and share the group's owner.
    fn check_references(conn: &Connection, owner: Uuid, fields: &GroupFields) -> Result<()> {
        let Some(template_id) = fields.notification_template_id else {
            return Ok(());
        };

        let owned: bool = conn.query_row(
            "SELECT EXISTS (
                SELECT 1 FROM notification_template
                WHERE notification_template_id = ?1 AND master_id = ?2
             )",
            (template_id.to_string(), owner.to_string()),
            |row| row.get(0),
        )?;

        if owned {
            Ok(())
        } else {
            Err(StoreError::InvalidReference("notification_template_id"))
        }
    }
}

fn opt_text(value: &Option<String>) -> Value {
    value.clone().map_or(Value::Null, Value::Text)
}

pub(crate) fn read_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn read_opt_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
