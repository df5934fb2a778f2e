//! SQLite cache backend.
//!
//! Entries live in a single table:
//!
//! - `key`: the cache key (primary key)
//! - `value`: serialized JSON
//! - `expires_at`: Unix timestamp in milliseconds
//!
//! Reads ignore stale rows and never modify the table. Each write first deletes
//! every row that has already expired, so the table stays bounded by the live set.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::CacheBackend;
use crate::error::CacheError;

/// Cache backend over an SQLite connection pool.
#[derive(Clone)]
pub struct SqliteCacheBackend {
    pool: SqlitePool,
}

impl SqliteCacheBackend {
    /// Connect and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:cache.db" or "sqlite::memory:")
    pub async fn connect(database_url: &str) -> Result<Self, CacheError> {
        let options = if database_url.contains(":memory:") {
            // Every connection to `:memory:` is a separate database, so keep exactly one alive.
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = options.connect(database_url).await?;
        let backend = Self { pool };
        backend.initialize_schema().await?;

        Ok(backend)
    }

    async fn initialize_schema(&self) -> Result<(), CacheError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let row = sqlx::query(
            r#"
            SELECT value
            FROM cache_entries
            WHERE key = ? AND expires_at > ?
            "#,
        )
        .bind(key)
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("value")))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let now = now_millis();
        let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = now.saturating_add(ttl_millis);

        let purged = sqlx::query(
            r#"
            DELETE FROM cache_entries
            WHERE expires_at <= ?
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }

        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_matching(&self, pattern: &str) -> Result<u64, CacheError> {
        let result = sqlx::query(
            r#"
            DELETE FROM cache_entries
            WHERE key GLOB ?
            "#,
        )
        .bind(pattern)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
