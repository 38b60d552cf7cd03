// SQLite implementation of KvStore.
//
// Each kind of value gets its own table. A key may only live in one of them,
// which `kind_of` checks before every write.

use crate::core::store::kv_store::{glob_match, KvStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Str,
    Hash,
    Set,
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::StorageError(e.to_string())
}

pub struct SqliteKvStore {
    pool: Pool<Sqlite>,
}

impl SqliteKvStore {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new().connect(&conn_str).await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_strings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_hashes (
                key TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, field)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_sets (
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (key, member)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn kind_of(&self, key: &str) -> Result<Option<Kind>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT 's' FROM kv_strings WHERE key = ?
            UNION ALL SELECT 'h' FROM kv_hashes WHERE key = ?
            UNION ALL SELECT 'm' FROM kv_sets WHERE key = ?
            LIMIT 1
            "#,
        )
        .bind(key)
        .bind(key)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(row.map(|row| match row.get::<String, _>(0).as_str() {
            "s" => Kind::Str,
            "h" => Kind::Hash,
            _ => Kind::Set,
        }))
    }

    /// Fail with `WrongType` when the key exists with another kind.
    async fn expect_kind(&self, key: &str, kind: Kind) -> Result<(), StoreError> {
        match self.kind_of(key).await? {
            Some(found) if found != kind => Err(StoreError::WrongType(key.to_string())),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.expect_kind(key, Kind::Str).await?;

        let row = sqlx::query("SELECT value FROM kv_strings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(|row| row.get::<String, _>(0)))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.expect_kind(key, Kind::Str).await?;

        sqlx::query(
            r#"
            INSERT INTO kv_strings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.expect_kind(key, Kind::Hash).await?;

        let row = sqlx::query("SELECT value FROM kv_hashes WHERE key = ? AND field = ?")
            .bind(key)
            .bind(field)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.map(|row| row.get::<String, _>(0)))
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<bool, StoreError> {
        let is_new = self.hget(key, field).await?.is_none();

        sqlx::query(
            r#"
            INSERT INTO kv_hashes (key, field, value) VALUES (?, ?, ?)
            ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(field)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(is_new)
    }

    async fn hmset(&self, key: &str, fields: &HashMap<String, String>) -> Result<(), StoreError> {
        self.expect_kind(key, Kind::Hash).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for (field, value) in fields {
            sqlx::query(
                r#"
                INSERT INTO kv_hashes (key, field, value) VALUES (?, ?, ?)
                ON CONFLICT(key, field) DO UPDATE SET value = excluded.value
                "#,
            )
            .bind(key)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.expect_kind(key, Kind::Hash).await?;

        let rows = sqlx::query("SELECT field, value FROM kv_hashes WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>(0), row.get::<String, _>(1)))
            .collect())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool, StoreError> {
        self.expect_kind(key, Kind::Hash).await?;

        let result = sqlx::query("DELETE FROM kv_hashes WHERE key = ? AND field = ?")
            .bind(key)
            .bind(field)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn hlen(&self, key: &str) -> Result<usize, StoreError> {
        self.expect_kind(key, Kind::Hash).await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_hashes WHERE key = ?")
            .bind(key)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(count as usize)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.expect_kind(key, Kind::Set).await?;

        let result = sqlx::query("INSERT OR IGNORE INTO kv_sets (key, member) VALUES (?, ?)")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.expect_kind(key, Kind::Set).await?;

        let result = sqlx::query("DELETE FROM kv_sets WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.expect_kind(key, Kind::Set).await?;

        let row = sqlx::query("SELECT 1 FROM kv_sets WHERE key = ? AND member = ?")
            .bind(key)
            .bind(member)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(row.is_some())
    }

    async fn smembers(&self, key: &str) -> Result<HashSet<String>, StoreError> {
        self.expect_kind(key, Kind::Set).await?;

        let rows = sqlx::query("SELECT member FROM kv_sets WHERE key = ?")
            .bind(key)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(rows.into_iter().map(|row| row.get::<String, _>(0)).collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.kind_of(key).await?.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut removed = 0;
        for table in ["kv_strings", "kv_hashes", "kv_sets"] {
            let result = sqlx::query(&format!("DELETE FROM {} WHERE key = ?", table))
                .bind(key)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            removed += result.rows_affected();
        }
        Ok(removed > 0)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM kv_strings
            UNION SELECT key FROM kv_hashes
            UNION SELECT key FROM kv_sets
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut keys: Vec<String> = rows
            .into_iter()
            .map(|row| row.get::<String, _>(0))
            .filter(|key| glob_match(pattern, key))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn size(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM (
                SELECT key FROM kv_strings
                UNION SELECT key FROM kv_hashes
                UNION SELECT key FROM kv_sets
            )
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(count as usize)
    }
}
