use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Writable field sets --
//
// These are the bodies accepted by the create and modify endpoints. Unknown
// fields are rejected so a typo never silently drops data.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipientFields {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateFields {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupFields {
    pub name: String,
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_template_id: Option<Uuid>,
}

// -- Drafts --

/// An uncommitted object waiting for confirmation.
#[derive(Debug, Clone, Serialize)]
pub struct Draft<F> {
    pub draft_id: Uuid,
    pub master_id: Uuid,
    #[serde(flatten)]
    pub fields: F,
}

// -- Committed entities --

#[derive(Debug, Clone, Serialize)]
pub struct Recipient {
    pub recipient_id: Uuid,
    pub master_id: Uuid,
    #[serde(flatten)]
    pub fields: RecipientFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct Template {
    pub notification_template_id: Uuid,
    pub master_id: Uuid,
    #[serde(flatten)]
    pub fields: TemplateFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub recipient_group_id: Uuid,
    pub master_id: Uuid,
    #[serde(flatten)]
    pub fields: GroupFields,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Telegram,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationType::Telegram => "telegram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "telegram" => Some(NotificationType::Telegram),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub notification_id: Uuid,
    pub batch_id: Uuid,
    pub recipient_id: Uuid,
    pub recipient_group_id: Uuid,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub creation_timestamp: DateTime<Utc>,
    pub completion_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationBatch {
    pub batch_id: Uuid,
}
