//! Repository for the per-entity record collections (blog posts, products, ...).

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::StoredRecord;

/// Collections an editor session may open.
pub const COLLECTIONS: [&str; 5] = ["blog", "products", "portfolio", "team", "vlog"];

pub fn is_known_collection(collection: &str) -> bool {
    COLLECTIONS.contains(&collection)
}

/// Database repository for record operations.
#[derive(Clone)]
pub struct RecordRepository {
    pool: SqlitePool,
}

impl RecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// List all records of a collection, most recently updated first.
    pub async fn list(&self, collection: &str) -> Result<Vec<StoredRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT id, collection, data, created_at, updated_at, updated_by, version FROM records WHERE collection = ? ORDER BY updated_at DESC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Get a record by ID.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<StoredRecord>, AppError> {
        let row = sqlx::query(
            "SELECT id, collection, data, created_at, updated_at, updated_by, version FROM records WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(record_from_row))
    }

    /// Create a record and return its new ID.
    pub async fn create(
        &self,
        collection: &str,
        data: &Map<String, Value>,
        editor: &str,
    ) -> Result<String, AppError> {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let data_json = serde_json::to_string(data)?;

        sqlx::query(
            "INSERT INTO records (id, collection, data, created_at, updated_at, updated_by, version) VALUES (?, ?, ?, ?, ?, ?, 1)",
        )
        .bind(&id)
        .bind(collection)
        .bind(&data_json)
        .bind(&now)
        .bind(&now)
        .bind(editor)
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Overwrite a record's data. Last writer wins.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        data: &Map<String, Value>,
        editor: &str,
    ) -> Result<(), AppError> {
        let now = Utc::now().to_rfc3339();
        let data_json = serde_json::to_string(data)?;

        let result = sqlx::query(
            "UPDATE records SET data = ?, updated_at = ?, updated_by = ?, version = version + 1 WHERE collection = ? AND id = ?",
        )
        .bind(&data_json)
        .bind(&now)
        .bind(editor)
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "Record {} not found in {}",
                id, collection
            )));
        }

        Ok(())
    }
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredRecord {
    let data_str: String = row.get("data");
    StoredRecord {
        id: row.get("id"),
        collection: row.get("collection"),
        data: serde_json::from_str(&data_str).unwrap_or_default(),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        updated_by: row.get("updated_by"),
        version: row.get("version"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_database;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_update_get() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = RecordRepository::new(pool);

        let data = json!({ "title": "Draft" }).as_object().cloned().unwrap();
        let id = repo.create("blog", &data, "ed@example.com").await.unwrap();

        let data = json!({ "title": "Final" }).as_object().cloned().unwrap();
        repo.update("blog", &id, &data, "ed@example.com")
            .await
            .unwrap();

        let record = repo.get("blog", &id).await.unwrap().unwrap();
        assert_eq!(record.data["title"], "Final");
        assert_eq!(record.version, 2);
        assert_eq!(record.updated_by, "ed@example.com");

        assert!(repo.get("products", &id).await.unwrap().is_none());
        assert_eq!(repo.list("blog").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let dir = TempDir::new().unwrap();
        let pool = init_database(&dir.path().join("test.sqlite")).await.unwrap();
        let repo = RecordRepository::new(pool);

        let err = repo
            .update("blog", "nope", &Map::new(), "ed@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
