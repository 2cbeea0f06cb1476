//! SQLite-backed document store with in-process change fan-out.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};
use tokio::sync::broadcast;

use super::{DocumentChange, DocumentSnapshot, DocumentWatch, RemoteStore};
use crate::errors::SyncError;

/// Document store over the `documents` table.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    pool: SqlitePool,
    changes: broadcast::Sender<DocumentChange>,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(256);
        Self { pool, changes }
    }
}

#[async_trait]
impl RemoteStore for SqliteDocumentStore {
    async fn get_document(&self, path: &str) -> Result<DocumentSnapshot, SyncError> {
        let row = sqlx::query("SELECT data, revision FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(DocumentSnapshot::missing());
        };

        let raw: String = row.get("data");
        Ok(DocumentSnapshot {
            exists: true,
            data: parse_document(&raw)?,
            revision: row.get("revision"),
        })
    }

    async fn set_document(
        &self,
        path: &str,
        data: Map<String, Value>,
        merge: bool,
    ) -> Result<i64, SyncError> {
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT data, revision FROM documents WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;

        let (mut stored, revision) = match existing {
            Some(row) => {
                let raw: String = row.get("data");
                (parse_document(&raw)?, row.get::<i64, _>("revision"))
            }
            None => (Map::new(), 0),
        };

        if merge {
            for (key, value) in data {
                stored.insert(key, value);
            }
        } else {
            stored = data;
        }

        let new_revision = revision + 1;
        let now = Utc::now().to_rfc3339();
        let encoded = serde_json::to_string(&stored)?;

        sqlx::query(
            "INSERT INTO documents (path, data, revision, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(path) DO UPDATE SET data = excluded.data, revision = excluded.revision, updated_at = excluded.updated_at",
        )
        .bind(path)
        .bind(&encoded)
        .bind(new_revision)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        // No receivers is not an error
        let _ = self.changes.send(DocumentChange {
            path: path.to_string(),
            snapshot: DocumentSnapshot {
                exists: true,
                data: stored,
                revision: new_revision,
            },
        });

        tracing::debug!("Wrote document {} at revision {}", path, new_revision);
        Ok(new_revision)
    }

    fn subscribe(&self, path: &str) -> Result<DocumentWatch, SyncError> {
        Ok(DocumentWatch::new(path, self.changes.subscribe()))
    }
}

fn parse_document(raw: &str) -> Result<Map<String, Value>, SyncError> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(map),
        _ => Err(SyncError::Serialization(
            "stored document is not an object".to_string(),
        )),
    }
}
