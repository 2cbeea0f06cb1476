//! Editor session endpoints. Each open editor auto-saves one record.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{error, require_session, success, ApiResult};
use crate::auth::Session;
use crate::autosave::{AutoSaveState, EditorSession};
use crate::db::is_known_collection;
use crate::errors::AppError;
use crate::models::Entry;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenEditorRequest {
    pub collection: String,
    /// Existing record to edit; omitted for a new record
    #[serde(default)]
    pub record_id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorView {
    pub session_id: Uuid,
    pub collection: String,
    #[serde(flatten)]
    pub state: AutoSaveState<Entry>,
    pub should_confirm_leave: bool,
}

impl EditorView {
    fn of(session_id: Uuid, session: &EditorSession) -> Self {
        Self {
            session_id,
            collection: session.collection.clone(),
            state: session.editor.state(),
            should_confirm_leave: session.editor.should_confirm_leave(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedView {
    pub closed: bool,
    pub discarded_changes: bool,
}

/// POST /api/admin/editors - Open an editor on a new or existing record.
pub async fn open_editor(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<OpenEditorRequest>,
) -> ApiResult<EditorView> {
    let revision_id = state.sync.last_revision();

    if let Err(e) = require_session(&session) {
        return error(e, revision_id);
    }
    if !is_known_collection(&request.collection) {
        return error(
            AppError::NotFound(format!("Unknown collection '{}'", request.collection)),
            revision_id,
        );
    }

    let initial = match &request.record_id {
        Some(id) => match state.records.get(&request.collection, id).await {
            Ok(Some(record)) => Entry {
                id: Some(record.id),
                fields: record.data,
            },
            Ok(None) => {
                return error(
                    AppError::NotFound(format!("Record {} not found", id)),
                    revision_id,
                )
            }
            Err(e) => return error(e, revision_id),
        },
        None => Entry::new(request.data),
    };

    let session_id = state
        .editors
        .open(&request.collection, initial, session.editor());

    match state.editors.get(&session_id) {
        Some(editor) => success(EditorView::of(session_id, &editor), revision_id),
        None => error(
            AppError::Internal("Editor closed while opening".to_string()),
            revision_id,
        ),
    }
}

/// GET /api/admin/editors/:id - Current editor state.
pub async fn get_editor(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<EditorView> {
    let revision_id = state.sync.last_revision();
    match find_editor(&state, &session, &session_id) {
        Ok(editor) => success(EditorView::of(session_id, &editor), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// PATCH /api/admin/editors/:id - Edit fields; schedules an auto-save.
pub async fn update_editor(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(session_id): Path<Uuid>,
    Json(patch): Json<Map<String, Value>>,
) -> ApiResult<EditorView> {
    let revision_id = state.sync.last_revision();
    let editor = match find_editor(&state, &session, &session_id) {
        Ok(editor) => editor,
        Err(e) => return error(e, revision_id),
    };

    editor.editor.update_data(|entry| entry.merge(patch));
    success(EditorView::of(session_id, &editor), revision_id)
}

/// POST /api/admin/editors/:id/save - Save immediately.
pub async fn save_editor(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<EditorView> {
    let revision_id = state.sync.last_revision();
    let editor = match find_editor(&state, &session, &session_id) {
        Ok(editor) => editor,
        Err(e) => return error(e, revision_id),
    };

    match editor.editor.save().await {
        Ok(()) => success(EditorView::of(session_id, &editor), revision_id),
        Err(e) => error(e, revision_id),
    }
}

/// DELETE /api/admin/editors/:id - Close the editor, dropping unsaved edits.
pub async fn close_editor(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<ClosedView> {
    let revision_id = state.sync.last_revision();
    let editor = match find_editor(&state, &session, &session_id) {
        Ok(editor) => editor,
        Err(e) => return error(e, revision_id),
    };

    let discarded_changes = editor.editor.should_confirm_leave();
    drop(editor);
    let closed = state.editors.close(&session_id);
    success(
        ClosedView {
            closed,
            discarded_changes,
        },
        revision_id,
    )
}

fn find_editor(
    state: &AppState,
    session: &Session,
    session_id: &Uuid,
) -> Result<std::sync::Arc<EditorSession>, AppError> {
    require_session(session)?;
    state
        .editors
        .get(session_id)
        .ok_or_else(|| AppError::NotFound(format!("Editor {} not found", session_id)))
}
