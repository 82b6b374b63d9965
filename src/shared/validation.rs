//! Validation Utilities

use validator::ValidationErrors;

use super::error::AppError;

/// Convert validation errors to AppError
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let detail = e
                    .message
                    .clone()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string());
                format!("{}: {}", field, detail)
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into());

    AppError::InvalidArgument(message)
}

/// Reject absent (non-positive) identifiers.
pub fn require_id(value: i64, what: &str) -> Result<i64, AppError> {
    if value <= 0 {
        return Err(AppError::InvalidArgument(format!("{} is required", what)));
    }
    Ok(value)
}
