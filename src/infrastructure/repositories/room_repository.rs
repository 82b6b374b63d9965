//! Room Repository Implementation
//!
//! PostgreSQL implementation of the RoomRepository trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::{Room, RoomRepository};
use crate::shared::error::AppError;

/// Database row representation matching the chat_rooms table schema.
#[derive(Debug, sqlx::FromRow)]
struct RoomRow {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoomRow {
    fn into_room(self) -> Room {
        Room {
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// PostgreSQL room repository implementation.
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
}

impl PgRoomRepository {
    /// Create a new PgRoomRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoomRepository for PgRoomRepository {
    #[instrument(skip(self), level = "debug")]
    async fn create(&self, name: &str) -> Result<Room, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            INSERT INTO chat_rooms (name)
            VALUES ($1)
            RETURNING id, name, created_at, updated_at
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into_room())
    }

    #[instrument(skip(self), level = "debug")]
    async fn find_by_id(&self, id: i64) -> Result<Option<Room>, AppError> {
        let row = sqlx::query_as::<_, RoomRow>(
            r#"
            SELECT id, name, created_at, updated_at
            FROM chat_rooms
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(RoomRow::into_room))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM chat_rooms WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
