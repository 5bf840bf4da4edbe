// SQLite-backed group store.
//
// Tables:
// - group_filters: One row per group, config kept as the JSON document the service encodes

use crate::core::group_filter::{GroupFilterError, GroupRecord, GroupStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

pub struct SqliteGroupStore {
    pool: Pool<Sqlite>,
}

impl SqliteGroupStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and run migrations.
    pub async fn open(database_path: &str) -> anyhow::Result<Self> {
        let path = Path::new(database_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let pool = SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", database_path))
            .await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), GroupFilterError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_filters (
                group_id INTEGER PRIMARY KEY,
                config_json TEXT NOT NULL DEFAULT '',
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| GroupFilterError::StorageError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl GroupStore for SqliteGroupStore {
    async fn get_group(&self, group_id: u64) -> Result<Option<GroupRecord>, GroupFilterError> {
        let row =
            sqlx::query("SELECT config_json, updated_at FROM group_filters WHERE group_id = ?")
                .bind(group_id as i64)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| GroupFilterError::StorageError(e.to_string()))?;

        Ok(row.map(|row| {
            let updated_at_str: String = row.get("updated_at");
            let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now());

            GroupRecord {
                group_id,
                config_json: row.get("config_json"),
                updated_at,
            }
        }))
    }

    async fn save_group(&self, record: GroupRecord) -> Result<(), GroupFilterError> {
        sqlx::query(
            r#"
            INSERT INTO group_filters (group_id, config_json, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(group_id) DO UPDATE SET
                config_json = excluded.config_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(record.group_id as i64)
        .bind(&record.config_json)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| GroupFilterError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn delete_group(&self, group_id: u64) -> Result<bool, GroupFilterError> {
        let result = sqlx::query("DELETE FROM group_filters WHERE group_id = ?")
            .bind(group_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| GroupFilterError::StorageError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
