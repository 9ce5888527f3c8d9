//! Storage-specific error type wrapping sqlx errors.

use shutterlink_domain::error::ShutterLinkError;

/// Errors originating from the `SQLite` storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<StorageError> for ShutterLinkError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_wrap_into_storage_variant() {
        let err: ShutterLinkError = StorageError::Database(sqlx::Error::RowNotFound).into();
        assert!(matches!(err, ShutterLinkError::Storage(_)));
    }
}
