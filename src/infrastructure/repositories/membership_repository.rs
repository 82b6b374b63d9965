//! Membership Repository Implementation
//!
//! PostgreSQL implementation of the MembershipRepository trait.
//! The composite primary key makes add/remove idempotent.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::domain::MembershipRepository;
use crate::shared::error::AppError;

/// PostgreSQL membership repository implementation.
#[derive(Clone)]
pub struct PgMembershipRepository {
    pool: PgPool,
}

impl PgMembershipRepository {
    /// Create a new PgMembershipRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MembershipRepository for PgMembershipRepository {
    #[instrument(skip(self), level = "debug")]
    async fn add(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO room_members (room_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (room_id, user_id) DO NOTHING
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), level = "debug")]
    async fn remove(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = $1 AND user_id = $2")
            .bind(room_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, room_id: i64, user_id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM room_members WHERE room_id = $1 AND user_id = $2
            )
            "#,
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn find_room_ids_by_user(&self, user_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT room_id FROM room_members WHERE user_id = $1 ORDER BY room_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn find_user_ids_by_room(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM room_members WHERE room_id = $1 ORDER BY user_id",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_by_room(&self, room_id: i64) -> Result<Vec<i64>, AppError> {
        let ids = sqlx::query_scalar::<_, i64>(
            "DELETE FROM room_members WHERE room_id = $1 RETURNING user_id",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
