//! Defines the custom error types for the application.

use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model '{0}' cannot be created by the world")]
    InvalidModel(String),

    #[error("Vehicle {vehicle} is bound to {count} live entities")]
    BindConflict { vehicle: String, count: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether this error came out of the persistence layer rather than a
    /// policy or input check.
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Io(_)
                | Self::Database(_)
                | Self::Json(_)
                | Self::Join(_)
                | Self::Other(_)
        )
    }
}
