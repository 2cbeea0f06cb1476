//! Backing stores for the auto-save controller.

use async_trait::async_trait;

use crate::db::RecordRepository;
use crate::errors::AppError;
use crate::models::{EditableRecord, Entry};

/// Persistence for one kind of editable record.
#[async_trait]
pub trait RecordService<T: EditableRecord>: Send + Sync + 'static {
    /// Create the record and return its new id.
    async fn create(&self, data: &T, editor: &str) -> Result<String, AppError>;

    async fn update(&self, id: &str, data: &T, editor: &str) -> Result<(), AppError>;
}

/// Stores `Entry` records of one collection in the records table.
#[derive(Clone)]
pub struct CollectionService {
    repo: RecordRepository,
    collection: String,
}

impl CollectionService {
    pub fn new(repo: RecordRepository, collection: &str) -> Self {
        Self {
            repo,
            collection: collection.to_string(),
        }
    }
}

#[async_trait]
impl RecordService<Entry> for CollectionService {
    async fn create(&self, data: &Entry, editor: &str) -> Result<String, AppError> {
        self.repo.create(&self.collection, &data.fields, editor).await
    }

    async fn update(&self, id: &str, data: &Entry, editor: &str) -> Result<(), AppError> {
        self.repo
            .update(&self.collection, id, &data.fields, editor)
            .await
    }
}
