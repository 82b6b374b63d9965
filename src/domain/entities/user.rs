//! User identity as seen by the chat core.
//!
//! Accounts, passwords and token issuance belong to the account service; the
//! core only consumes token verification and profile lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;

/// Public profile of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub avatar: Option<String>,
}

/// Read-only lookup of user profiles.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError>;
}

/// Identity collaborator: token verification and user lookups.
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// Verify a bearer token and return the user id it was issued to.
    ///
    /// Fails with `Unauthorized` for invalid or expired tokens.
    async fn verify_token(&self, token: &str) -> Result<i64, AppError>;

    /// Fetch a user's profile. Fails with `NotFound` for unknown users.
    async fn get_user_profile(&self, user_id: i64) -> Result<UserProfile, AppError>;

    /// Fetch a user's display name.
    async fn get_user_name(&self, user_id: i64) -> Result<String, AppError> {
        Ok(self.get_user_profile(user_id).await?.name)
    }
}
