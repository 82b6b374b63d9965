//! Identity Module
//!
//! Implementation of the `IdentityService` collaborator: HS256 bearer tokens
//! issued by the account service, and profile lookups through a
//! `UserDirectory`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::{IdentityService, UserDirectory, UserProfile};
use crate::shared::error::AppError;

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// Token verification and profile lookups.
pub struct JwtIdentityService {
    key: DecodingKey,
    validation: Validation,
    directory: Arc<dyn UserDirectory>,
}

impl JwtIdentityService {
    pub fn new(secret: &str, directory: Arc<dyn UserDirectory>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            directory,
        }
    }
}

#[async_trait]
impl IdentityService for JwtIdentityService {
    #[instrument(skip_all, level = "debug")]
    async fn verify_token(&self, token: &str) -> Result<i64, AppError> {
        let token_data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AppError::Unauthorized("Token expired".into())
                }
                _ => AppError::Unauthorized("Invalid token".into()),
            }
        })?;

        let user_id: i64 = token_data
            .claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("Invalid token claims".into()))?;
        if user_id <= 0 {
            return Err(AppError::Unauthorized("Invalid token claims".into()));
        }

        debug!(user_id = user_id, "Token verified");
        Ok(user_id)
    }

    async fn get_user_profile(&self, user_id: i64) -> Result<UserProfile, AppError> {
        self.directory
            .find_profile(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }
}

/// Process-local user directory for the `memory` backend and tests.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<i64, UserProfile>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a profile.
    pub fn insert(&self, profile: UserProfile) {
        self.profiles.write().insert(profile.id, profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_profile(&self, user_id: i64) -> Result<Option<UserProfile>, AppError> {
        Ok(self.profiles.read().get(&user_id).cloned())
    }
}
