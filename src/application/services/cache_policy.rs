//! How services treat fast-cache results.
//!
//! Cache writes are soft: a failure is logged, counted and dropped. Cache
//! reads that fail are logged and treated as a miss so the caller falls back
//! to the durable store.

use tracing::warn;

use crate::infrastructure::metrics;
use crate::shared::error::AppError;

/// Swallow a failed cache write.
pub(crate) fn soft_write<T>(operation: &'static str, result: Result<T, AppError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation = operation, error = %e, "Cache write failed");
            metrics::record_cache_write_failure(operation);
            None
        }
    }
}

/// Turn a failed cache read into a miss.
pub(crate) fn soft_read<T>(operation: &'static str, result: Result<T, AppError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(operation = operation, error = %e, "Cache read failed, using durable store");
            None
        }
    }
}
