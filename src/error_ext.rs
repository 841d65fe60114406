//! Extension traits for error handling

use crate::error::{AppError, AppResult};

/// Extension trait for converting backend errors into storage failures
pub trait StorageContext<T> {
    /// Convert an error to `AppError::Storage` with context
    fn storage_err(self, context: &str) -> AppResult<T>;
}

impl<T, E: std::fmt::Display> StorageContext<T> for Result<T, E> {
    fn storage_err(self, context: &str) -> AppResult<T> {
        self.map_err(|e| AppError::Storage(format!("{}: {}", context, e)))
    }
}
