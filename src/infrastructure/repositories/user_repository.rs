//! User Directory Implementation
//!
//! Read-only PostgreSQL lookup of user profiles. The `users` table is owned
//! by the account service.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{UserDirectory, UserProfile};
use crate::shared::error::AppError;

/// Database row representation of a user profile.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    avatar: Option<String>,
}

impl UserRow {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            name: self.name,
            avatar: self.avatar,
        }
    }
}

/// PostgreSQL user directory.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT id, name, avatar FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(UserRow::into_profile))
    }
}
