//! SQLite-backed document store.
//!
//! All databases share one `documents` table keyed by `(db, id)`; the body
//! column holds the JSON document including its `_rev`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use super::{check_revision, doc_identity, next_revision, with_revision, DocumentStore};
use crate::errors::{AppError, AppResult};

/// Document store persisting to SQLite.
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    /// Opens (creating if missing) the database at `url` and ensures the schema.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let opts = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));

        // A single connection serialises writes and keeps `sqlite::memory:` to one database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> AppResult<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                db    TEXT NOT NULL,
                id    TEXT NOT NULL,
                rev   TEXT NOT NULL,
                body  TEXT NOT NULL,
                PRIMARY KEY (db, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("Failed to create documents table: {}", e)))?;

        tracing::info!("Document table ensured");
        Ok(())
    }
}

fn decode(body: &str) -> AppResult<Value> {
    serde_json::from_str(body)
        .map_err(|e| AppError::Database(format!("corrupt document body: {}", e)))
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, db: &str, id: &str) -> AppResult<Option<Value>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE db = ? AND id = ?")
                .bind(db)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|(body,)| decode(&body)).transpose()
    }

    async fn put(&self, db: &str, doc: Value) -> AppResult<String> {
        let (id, supplied) = doc_identity(&doc)?;
        let mut tx = self.pool.begin().await?;

        let stored: Option<(String,)> =
            sqlx::query_as("SELECT rev FROM documents WHERE db = ? AND id = ?")
                .bind(db)
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await?;
        let stored = stored.map(|(rev,)| rev);
        check_revision(&id, stored.as_deref(), supplied.as_deref())?;

        let rev = next_revision(stored.as_deref());
        let body = serde_json::to_string(&with_revision(doc, &rev))?;
        sqlx::query(
            "INSERT INTO documents (db, id, rev, body) VALUES (?, ?, ?, ?)
             ON CONFLICT (db, id) DO UPDATE SET rev = excluded.rev, body = excluded.body",
        )
        .bind(db)
        .bind(&id)
        .bind(&rev)
        .bind(&body)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::debug!(db = %db, id = %id, rev = %rev, "document written");
        Ok(rev)
    }

    async fn remove(&self, db: &str, id: &str, rev: &str) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        let stored: Option<(String,)> =
            sqlx::query_as("SELECT rev FROM documents WHERE db = ? AND id = ?")
                .bind(db)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let (stored,) =
            stored.ok_or_else(|| AppError::NotFound(format!("Document {} not found", id)))?;
        check_revision(id, Some(&stored), Some(rev))?;

        sqlx::query("DELETE FROM documents WHERE db = ? AND id = ?")
            .bind(db)
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn all_docs(&self, db: &str, prefix: &str) -> AppResult<Vec<Value>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT body FROM documents WHERE db = ? AND substr(id, 1, ?) = ? ORDER BY id",
        )
        .bind(db)
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(|(body,)| decode(body)).collect()
    }

    async fn list_databases(&self) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT db FROM documents ORDER BY db")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(db,)| db).collect())
    }

    async fn destroy_database(&self, db: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM documents WHERE db = ?")
            .bind(db)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
