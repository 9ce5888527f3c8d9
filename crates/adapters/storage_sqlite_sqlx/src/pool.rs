//! Opening the preference database.

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;

use crate::error::StorageError;
use crate::preference_store::SqlitePreferenceStore;

/// Where the preferences live.
pub struct Config {
    /// `sqlite:shutterlink.db`, or `sqlite::memory:` for a throwaway store.
    pub database_url: String,
}

impl Config {
    /// Open the database, creating the file on first run, and bring its
    /// schema up to date.
    ///
    /// # Errors
    ///
    /// [`StorageError`] when the URL is unusable, the file cannot be
    /// opened or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(url = %self.database_url, "preference database ready");
        Ok(Database { pool })
    }
}

/// An open, migrated preference database.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// A [`PreferenceStore`](shutterlink_app::ports::PreferenceStore)
    /// sharing this database's pool.
    #[must_use]
    pub fn preference_store(&self) -> SqlitePreferenceStore {
        SqlitePreferenceStore::new(self.pool.clone())
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use shutterlink_app::ports::PreferenceStore;

    use super::*;

    async fn memory() -> Database {
        Config {
            database_url: "sqlite::memory:".to_owned(),
        }
        .build()
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn should_create_key_value_preferences_table() {
        let db = memory().await;

        let columns: Vec<(String, i64)> =
            sqlx::query_as("SELECT name, pk FROM pragma_table_info('preferences') ORDER BY cid")
                .fetch_all(db.pool())
                .await
                .unwrap();

        assert_eq!(
            columns,
            vec![("key".to_owned(), 1), ("value".to_owned(), 0)]
        );
    }

    #[tokio::test]
    async fn should_share_pool_between_stores() {
        let db = memory().await;

        db.preference_store()
            .set("camera_name", "EOS R6")
            .await
            .unwrap();

        assert_eq!(
            db.preference_store().get("camera_name").await.unwrap().as_deref(),
            Some("EOS R6")
        );
    }
}
