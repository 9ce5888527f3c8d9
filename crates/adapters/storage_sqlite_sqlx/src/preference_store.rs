//! `SQLite` implementation of [`PreferenceStore`].

use std::future::Future;

use sqlx::SqlitePool;

use shutterlink_app::ports::PreferenceStore;
use shutterlink_domain::error::ShutterLinkError;

use crate::error::StorageError;

const SELECT_BY_KEY: &str = "SELECT value FROM preferences WHERE key = ?";
const UPSERT: &str = "INSERT INTO preferences (key, value) VALUES (?, ?) \
     ON CONFLICT(key) DO UPDATE SET value = excluded.value";

/// `SQLite`-backed preference store.
#[derive(Clone)]
pub struct SqlitePreferenceStore {
    pool: SqlitePool,
}

impl SqlitePreferenceStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl PreferenceStore for SqlitePreferenceStore {
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<String>, ShutterLinkError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_owned();
        async move {
            let row: Option<(String,)> = sqlx::query_as(SELECT_BY_KEY)
                .bind(&key)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(row.map(|(value,)| value))
        }
    }

    fn set(
        &self,
        key: &str,
        value: &str,
    ) -> impl Future<Output = Result<(), ShutterLinkError>> + Send {
        let pool = self.pool.clone();
        let key = key.to_owned();
        let value = value.to_owned();
        async move {
            sqlx::query(UPSERT)
                .bind(&key)
                .bind(&value)
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            tracing::trace!(%key, "preference stored");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use shutterlink_app::ports::preferences::keys;

    async fn setup() -> SqlitePreferenceStore {
        Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap()
        .preference_store()
    }

    #[tokio::test]
    async fn should_return_none_when_key_missing() {
        let store = setup().await;
        assert_eq!(store.get(keys::CAMERA_ADDRESS).await.unwrap(), None);
    }

    #[tokio::test]
    async fn should_return_stored_value() {
        let store = setup().await;
        store
            .set(keys::CAMERA_ADDRESS, "AA:BB:CC:DD:EE:FF")
            .await
            .unwrap();

        assert_eq!(
            store.get(keys::CAMERA_ADDRESS).await.unwrap().as_deref(),
            Some("AA:BB:CC:DD:EE:FF")
        );
    }

    #[tokio::test]
    async fn should_replace_value_when_key_already_set() {
        let store = setup().await;
        store.set(keys::CAMERA_NAME, "EOS R5").await.unwrap();
        store.set(keys::CAMERA_NAME, "EOS R6").await.unwrap();

        assert_eq!(
            store.get(keys::CAMERA_NAME).await.unwrap().as_deref(),
            Some("EOS R6")
        );
    }

    #[tokio::test]
    async fn should_keep_keys_independent() {
        let store = setup().await;
        store.set(keys::CAMERA_NAME, "EOS R6").await.unwrap();
        store.set(keys::LOCAL_DEVICE_NAME, "Pixel").await.unwrap();

        assert_eq!(
            store.get(keys::CAMERA_NAME).await.unwrap().as_deref(),
            Some("EOS R6")
        );
        assert_eq!(
            store.get(keys::LOCAL_DEVICE_NAME).await.unwrap().as_deref(),
            Some("Pixel")
        );
    }
}
