//! Storage-specific error type wrapping sqlx errors.

use certflow_domain::error::CertflowError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to serialize or deserialize a stored JSON value.
    #[error("JSON serialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write that must touch a row found none.
    #[error("no {table} row with id {id}")]
    MissingRow { table: &'static str, id: uuid::Uuid },
}

impl From<StorageError> for CertflowError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
