//! Custom Extractors
//!
//! Axum extractors for authentication and request parsing.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json, RequestPartsExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::shared::error::AppError;
use crate::shared::validation::validation_error;
use crate::startup::AppState;

/// Authenticated user extracted from the bearer token
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub user_id: i64,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .map_err(|_| AppError::Unauthorized("Missing authorization header".into()))?;

        let user_id = state.identity.verify_token(bearer.token()).await?;
        Ok(AuthUser { user_id })
    }
}

/// JSON body that has passed `validator` checks
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidArgument(e.body_text()))?;
        value.validate().map_err(validation_error)?;
        Ok(ValidatedJson(value))
    }
}
