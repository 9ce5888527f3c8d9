//! # shutterlink-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the [`PreferenceStore`](shutterlink_app::ports::PreferenceStore) port
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//!
//! ## Dependency rule
//! Depends on `shutterlink-app` (for port traits) and `shutterlink-domain`.
//! The `app` and `domain` crates must never reference this adapter.

mod error;
pub mod pool;
mod preference_store;

pub use error::StorageError;
pub use preference_store::SqlitePreferenceStore;
