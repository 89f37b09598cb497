//! Staff chat models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChatStatus {
    Open,
    Closed,
}

crate::string_enum!(ChatStatus, "chat status", {
    Open => "open",
    Closed => "closed",
});

impl ChatStatus {
    pub fn accepts_messages(&self) -> bool {
        *self == ChatStatus::Open
    }
}

/// A conversation thread between front-of-house and kitchen staff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: Uuid,
    pub subject: String,
    pub status: ChatStatus,
    pub created_by: Uuid,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Chat with the unread count for the requesting user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(flatten)]
    pub chat: Chat,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
