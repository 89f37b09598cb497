//! Staff chat threads

use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::{Chat, ChatStatus, ChatSummary, Message, RealtimeEvent};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::realtime::EventHub;

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

#[derive(Clone)]
pub struct ChatService {
    db: PgPool,
    events: EventHub,
}

#[derive(Debug, FromRow)]
struct ChatRow {
    id: Uuid,
    subject: String,
    status: String,
    created_by: Uuid,
    last_message_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ChatRow> for Chat {
    type Error = AppError;

    fn try_from(row: ChatRow) -> AppResult<Self> {
        Ok(Chat {
            id: row.id,
            subject: row.subject,
            status: row
                .status
                .parse()
                .map_err(|e| AppError::Internal(format!("{}", e)))?,
            created_by: row.created_by,
            last_message_at: row.last_message_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ChatSummaryRow {
    #[sqlx(flatten)]
    chat: ChatRow,
    unread_count: i64,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    id: Uuid,
    chat_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    body: String,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            body: row.body,
            created_at: row.created_at,
        }
    }
}

const CHAT_COLUMNS: &str = "id, subject, status, created_by, last_message_at, created_at, updated_at";

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChatInput {
    #[validate(length(min = 1, max = 150, message = "Subject must be 1-150 characters"))]
    pub subject: String,
    /// Optional opening message
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageInput {
    pub body: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatFilter {
    pub status: Option<ChatStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    /// Only messages strictly older than this
    pub before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

fn validate_body(body: &str) -> AppResult<&str> {
    let body = body.trim();
    shared::validate_message_body(body).map_err(|m| AppError::validation("body", m))?;
    Ok(body)
}

impl ChatService {
    pub fn new(db: PgPool, events: EventHub) -> Self {
        Self { db, events }
    }

    pub async fn create_chat(&self, created_by: Uuid, input: CreateChatInput) -> AppResult<Chat> {
        input.validate()?;
        let opening = input.message.as_deref().map(validate_body).transpose()?;

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ChatRow>(&format!(
            r#"
            INSERT INTO chats (subject, created_by)
            VALUES ($1, $2)
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(input.subject.trim())
        .bind(created_by)
        .fetch_one(&mut *tx)
        .await?;

        let message = match opening {
            Some(body) => Some(Self::insert_message(&mut tx, row.id, created_by, body).await?),
            None => None,
        };

        tx.commit().await?;

        let chat = match message {
            Some(_) => self.get_chat(row.id).await?,
            None => Chat::try_from(row)?,
        };

        tracing::info!(chat_id = %chat.id, %created_by, "chat opened");

        self.events.publish(RealtimeEvent::ChatCreated(chat.clone()));
        if let Some(message) = message {
            self.events.publish(RealtimeEvent::ChatMessage(message));
        }

        Ok(chat)
    }

    /// Chats with the caller's unread count, most recently active first
    pub async fn list_chats(&self, user_id: Uuid, filter: ChatFilter) -> AppResult<Vec<ChatSummary>> {
        let rows = sqlx::query_as::<_, ChatSummaryRow>(
            r#"
            SELECT c.id, c.subject, c.status, c.created_by, c.last_message_at,
                   c.created_at, c.updated_at,
                   (
                       SELECT COUNT(*) FROM messages m
                       WHERE m.chat_id = c.id
                         AND m.sender_id <> $1
                         AND (r.last_read_at IS NULL OR m.created_at > r.last_read_at)
                   ) AS unread_count
            FROM chats c
            LEFT JOIN chat_reads r ON r.chat_id = c.id AND r.user_id = $1
            WHERE ($2::text IS NULL OR c.status = $2)
            ORDER BY COALESCE(c.last_message_at, c.created_at) DESC
            "#,
        )
        .bind(user_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&self.db)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(ChatSummary {
                    chat: row.chat.try_into()?,
                    unread_count: row.unread_count,
                })
            })
            .collect()
    }

    pub async fn get_chat(&self, chat_id: Uuid) -> AppResult<Chat> {
        sqlx::query_as::<_, ChatRow>(&format!("SELECT {CHAT_COLUMNS} FROM chats WHERE id = $1"))
            .bind(chat_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Chat"))?
            .try_into()
    }

    /// A page of messages in chronological order, ending before `before`
    pub async fn list_messages(&self, chat_id: Uuid, query: MessageQuery) -> AppResult<Vec<Message>> {
        self.get_chat(chat_id).await?;
        let limit = query.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);

        let mut rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.chat_id, m.sender_id, u.name AS sender_name, m.body, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.sender_id
            WHERE m.chat_id = $1 AND ($2::timestamptz IS NULL OR m.created_at < $2)
            ORDER BY m.created_at DESC
            LIMIT $3
            "#,
        )
        .bind(chat_id)
        .bind(query.before)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.reverse();
        Ok(rows.into_iter().map(Message::from).collect())
    }

    pub async fn send_message(
        &self,
        sender_id: Uuid,
        chat_id: Uuid,
        input: SendMessageInput,
    ) -> AppResult<Message> {
        let body = validate_body(&input.body)?;

        let mut tx = self.db.begin().await?;

        let status = sqlx::query_scalar::<_, String>("SELECT status FROM chats WHERE id = $1 FOR UPDATE")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found("Chat"))?;

        let status: ChatStatus = status
            .parse()
            .map_err(|e| AppError::Internal(format!("{}", e)))?;
        if !status.accepts_messages() {
            return Err(AppError::BusinessRule(
                "This chat is closed; reopen it to send messages".to_string(),
            ));
        }

        let message = Self::insert_message(&mut tx, chat_id, sender_id, body).await?;

        tx.commit().await?;

        self.events
            .publish(RealtimeEvent::ChatMessage(message.clone()));

        Ok(message)
    }

    pub async fn close_chat(&self, chat_id: Uuid) -> AppResult<Chat> {
        self.set_status(chat_id, ChatStatus::Closed).await
    }

    pub async fn reopen_chat(&self, chat_id: Uuid) -> AppResult<Chat> {
        self.set_status(chat_id, ChatStatus::Open).await
    }

    /// Move the caller's read marker to now
    pub async fn mark_read(&self, user_id: Uuid, chat_id: Uuid) -> AppResult<()> {
        self.get_chat(chat_id).await?;

        sqlx::query(
            r#"
            INSERT INTO chat_reads (chat_id, user_id, last_read_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (chat_id, user_id) DO UPDATE SET last_read_at = EXCLUDED.last_read_at
            "#,
        )
        .bind(chat_id)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn set_status(&self, chat_id: Uuid, status: ChatStatus) -> AppResult<Chat> {
        let current = self.get_chat(chat_id).await?;
        if current.status == status {
            return Err(AppError::InvalidStateTransition(format!(
                "Chat is already {}",
                status
            )));
        }

        let row = sqlx::query_as::<_, ChatRow>(&format!(
            r#"
            UPDATE chats SET status = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {CHAT_COLUMNS}
            "#
        ))
        .bind(chat_id)
        .bind(status.as_str())
        .fetch_one(&self.db)
        .await?;

        tracing::info!(%chat_id, %status, "chat status changed");
        self.events
            .publish(RealtimeEvent::ChatStatusChanged { chat_id, status });

        row.try_into()
    }

    async fn insert_message(
        tx: &mut Transaction<'_, Postgres>,
        chat_id: Uuid,
        sender_id: Uuid,
        body: &str,
    ) -> AppResult<Message> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            WITH inserted AS (
                INSERT INTO messages (chat_id, sender_id, body)
                VALUES ($1, $2, $3)
                RETURNING id, chat_id, sender_id, body, created_at
            )
            SELECT i.id, i.chat_id, i.sender_id, u.name AS sender_name, i.body, i.created_at
            FROM inserted i
            JOIN users u ON u.id = i.sender_id
            "#,
        )
        .bind(chat_id)
        .bind(sender_id)
        .bind(body)
        .fetch_one(&mut **tx)
        .await?;

        sqlx::query("UPDATE chats SET last_message_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(chat_id)
            .bind(row.created_at)
            .execute(&mut **tx)
            .await?;

        Ok(row.into())
    }
}
