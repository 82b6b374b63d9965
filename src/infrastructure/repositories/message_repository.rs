//! Message Repository Implementation
//!
//! PostgreSQL implementation of the room message log and its read marks.
//! Read marks live in `message_reads`; `read_by_count` on `messages` is kept
//! in step by the same statement that inserts a mark.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{Message, MessageRepository, MessageType, NewMessage};
use crate::shared::error::AppError;

/// PostgreSQL message repository implementation.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    /// Creates a new PgMessageRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// `read_by` is aggregated from `message_reads`.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i64,
    room_id: i64,
    sender_id: i64,
    sender_name: String,
    content: String,
    message_type: String,
    sent_at: DateTime<Utc>,
    read_by_count: i32,
    read_by: Vec<i64>,
}

impl MessageRow {
    /// Converts database row to domain Message entity.
    fn into_message(self) -> Result<Message, AppError> {
        let message_type = self.message_type.parse::<MessageType>().map_err(|_| {
            AppError::Storage(format!(
                "message {} has unknown type {}",
                self.id, self.message_type
            ))
        })?;

        Ok(Message {
            id: self.id,
            room_id: self.room_id,
            sender_id: self.sender_id,
            sender_name: self.sender_name,
            content: self.content,
            message_type,
            sent_at: self.sent_at,
            read_by_count: self.read_by_count,
            read_by: self.read_by.into_iter().collect(),
        })
    }
}

fn into_messages(rows: Vec<MessageRow>) -> Result<Vec<Message>, AppError> {
    rows.into_iter().map(MessageRow::into_message).collect()
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self, message), fields(room_id = message.room_id), level = "debug")]
    async fn create(&self, message: &NewMessage) -> Result<Message, AppError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO messages (room_id, sender_id, sender_name, content, message_type, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(message.room_id)
        .bind(message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.content)
        .bind(message.message_type.as_str())
        .bind(message.sent_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(Message::from_new(id, message.clone()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.room_id, m.sender_id, m.sender_name, m.content,
                   m.message_type, m.sent_at, m.read_by_count,
                   COALESCE(ARRAY(
                       SELECT r.user_id FROM message_reads r
                       WHERE r.message_id = m.id ORDER BY r.user_id
                   ), '{}') AS read_by
            FROM messages m
            WHERE m.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MessageRow::into_message).transpose()
    }

    /// Ordered by `sent_at`, then id, so it matches the cache rank order.
    #[instrument(skip(self), level = "debug")]
    async fn find_page(
        &self,
        room_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.room_id, m.sender_id, m.sender_name, m.content,
                   m.message_type, m.sent_at, m.read_by_count,
                   COALESCE(ARRAY(
                       SELECT r.user_id FROM message_reads r
                       WHERE r.message_id = m.id ORDER BY r.user_id
                   ), '{}') AS read_by
            FROM messages m
            WHERE m.room_id = $1
            ORDER BY m.sent_at ASC, m.id ASC
            OFFSET $2
            LIMIT $3
            "#,
        )
        .bind(room_id)
        .bind(offset)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_messages(rows)
    }

    async fn find_latest(&self, room_id: i64) -> Result<Option<Message>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.room_id, m.sender_id, m.sender_name, m.content,
                   m.message_type, m.sent_at, m.read_by_count,
                   COALESCE(ARRAY(
                       SELECT r.user_id FROM message_reads r
                       WHERE r.message_id = m.id ORDER BY r.user_id
                   ), '{}') AS read_by
            FROM messages m
            WHERE m.room_id = $1
            ORDER BY m.sent_at DESC, m.id DESC
            LIMIT 1
            "#,
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(MessageRow::into_message).transpose()
    }

    async fn find_all_by_room(&self, room_id: i64) -> Result<Vec<Message>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT m.id, m.room_id, m.sender_id, m.sender_name, m.content,
                   m.message_type, m.sent_at, m.read_by_count,
                   COALESCE(ARRAY(
                       SELECT r.user_id FROM message_reads r
                       WHERE r.message_id = m.id ORDER BY r.user_id
                   ), '{}') AS read_by
            FROM messages m
            WHERE m.room_id = $1
            ORDER BY m.sent_at ASC, m.id ASC
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        into_messages(rows)
    }

    async fn last_activity(
        &self,
        room_ids: &[i64],
    ) -> Result<Vec<(i64, DateTime<Utc>)>, AppError> {
        if room_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, (i64, DateTime<Utc>)>(
            r#"
            SELECT room_id, MAX(sent_at) AS last_sent_at
            FROM messages
            WHERE room_id = ANY($1)
            GROUP BY room_id
            "#,
        )
        .bind(room_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Read marks go with their messages (`ON DELETE CASCADE`).
    #[instrument(skip(self), level = "debug")]
    async fn delete_by_room(&self, room_id: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE room_id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), level = "debug")]
    async fn mark_read(&self, message_id: i64, user_id: i64) -> Result<bool, AppError> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            WITH inserted AS (
                INSERT INTO message_reads (message_id, user_id)
                SELECT id, $2 FROM messages
                WHERE id = $1 AND sender_id <> $2
                ON CONFLICT (message_id, user_id) DO NOTHING
                RETURNING message_id
            )
            UPDATE messages
            SET read_by_count = read_by_count + 1
            WHERE id IN (SELECT message_id FROM inserted)
            RETURNING id
            "#,
        )
        .bind(message_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(updated.is_some())
    }

    #[instrument(skip(self), level = "debug")]
    async fn mark_all_read(&self, room_id: i64, user_id: i64) -> Result<Vec<i64>, AppError> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            WITH inserted AS (
                INSERT INTO message_reads (message_id, user_id)
                SELECT id, $2 FROM messages
                WHERE room_id = $1 AND sender_id <> $2
                ON CONFLICT (message_id, user_id) DO NOTHING
                RETURNING message_id
            )
            UPDATE messages
            SET read_by_count = read_by_count + 1
            WHERE id IN (SELECT message_id FROM inserted)
            RETURNING id
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn find_readers(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        let readers = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT DISTINCT r.user_id
            FROM message_reads r
            JOIN messages m ON m.id = r.message_id
            WHERE m.room_id = $1
            ORDER BY r.user_id
            "#,
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(readers)
    }
}
