//! Storage-specific error type wrapping sqlx errors.

use axlink_domain::error::AxlinkError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON payload.
    #[error("JSON payload error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for AxlinkError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
