//! Public record reads.

use axum::extract::{Path, State};

use super::{error, success, ApiResult};
use crate::db::is_known_collection;
use crate::errors::AppError;
use crate::models::StoredRecord;
use crate::AppState;

/// GET /api/records/:collection - List records of a collection.
pub async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
) -> ApiResult<Vec<StoredRecord>> {
    let revision_id = state.sync.last_revision();

    if !is_known_collection(&collection) {
        return error(
            AppError::NotFound(format!("Unknown collection '{}'", collection)),
            revision_id,
        );
    }

    match state.records.list(&collection).await {
        Ok(records) => success(records, revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// GET /api/records/:collection/:id - Get a single record.
pub async fn get_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> ApiResult<StoredRecord> {
    let revision_id = state.sync.last_revision();

    match state.records.get(&collection, &id).await {
        Ok(Some(record)) => success(record, revision_id),
        Ok(None) => error(
            AppError::NotFound(format!("Record {} not found", id)),
            revision_id,
        ),
        Err(e) => error(e, revision_id),
    }
}
