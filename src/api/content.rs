//! Website content endpoints.

use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use futures::Stream;
use serde::Serialize;
use serde_json::{Map, Value};

use super::{error, require_session, success, write_result, ApiResult};
use crate::auth::Session;
use crate::errors::{AppError, AppErrorWithRevision};
use crate::models::{ContentPath, NetworkStatus, SectionKey, SyncStatus};
use crate::sync::{Access, ContentState, WriteOutcome};
use crate::AppState;

/// Synchronizer and connectivity status.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub sync: SyncStatus,
    pub network: NetworkStatus,
    pub realtime: bool,
}

#[derive(Debug, Serialize)]
pub struct ReplayView {
    pub replayed: bool,
}

/// GET /api/content - Current website content.
pub async fn get_content(State(state): State<AppState>) -> ApiResult<ContentState> {
    success(state.sync.snapshot(), state.sync.last_revision())
}

/// GET /api/status - Save state and connection quality.
pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusView> {
    let view = StatusView {
        sync: state.sync.status(),
        network: state.sync.network().status(),
        realtime: state.sync.realtime_active(),
    };
    success(view, state.sync.last_revision())
}

/// POST /api/admin/content/load - Reload content from the remote store.
pub async fn load_content(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<ContentState> {
    state.sync.load(&Access::admin(session)).await;
    success(state.sync.snapshot(), state.sync.last_revision())
}

/// POST /api/admin/content/save - Persist the current content.
pub async fn save_content(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<WriteOutcome> {
    let access = Access::admin(session);
    let result = state.sync.save(&access).await;
    write_result(result, state.sync.last_revision())
}

/// PATCH /api/admin/content - Shallow-merge top-level keys.
pub async fn patch_content(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(patch): Json<Map<String, Value>>,
) -> ApiResult<WriteOutcome> {
    let access = Access::admin(session);
    let result = state.sync.update_content(&access, patch).await;
    write_result(result, state.sync.last_revision())
}

/// PUT /api/admin/content/sections/:section - Replace one section.
pub async fn put_section(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(section): Path<String>,
    Json(data): Json<Value>,
) -> ApiResult<WriteOutcome> {
    let Some(section) = SectionKey::from_key(&section) else {
        return error(
            AppError::NotFound(format!("Unknown section '{}'", section)),
            state.sync.last_revision(),
        );
    };

    let access = Access::admin(session);
    let result = state.sync.update_section(&access, section, data).await;
    write_result(result, state.sync.last_revision())
}

/// PUT /api/admin/content/paths/:path - Set a value at a dotted path.
pub async fn put_path(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(path): Path<String>,
    Json(data): Json<Value>,
) -> ApiResult<WriteOutcome> {
    let path = match ContentPath::parse(&path) {
        Ok(path) => path,
        Err(e) => return error(e.into(), state.sync.last_revision()),
    };

    let access = Access::admin(session);
    let result = state.sync.update_nested_content(&access, path, data).await;
    write_result(result, state.sync.last_revision())
}

/// POST /api/admin/content/reset - Restore the default content.
pub async fn reset_content(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<WriteOutcome> {
    let access = Access::admin(session);
    let result = state.sync.reset_content(&access).await;
    write_result(result, state.sync.last_revision())
}

/// POST /api/admin/content/replay - Push locally kept changes now.
pub async fn replay_pending(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<ReplayView> {
    if let Err(e) = require_session(&session) {
        return error(e, state.sync.last_revision());
    }

    match state.sync.replay_pending().await {
        Ok(replayed) => success(ReplayView { replayed }, state.sync.last_revision()),
        Err(e) => error(e.into(), state.sync.last_revision()),
    }
}

/// GET /api/admin/content/stream - Content snapshots as server-sent events.
///
/// The stream holds the real-time listener open for as long as the client
/// stays connected.
pub async fn stream_content(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppErrorWithRevision> {
    let Some(guard) = state.sync.acquire_realtime(&Access::admin(session)) else {
        return Err(AppErrorWithRevision {
            error: AppError::Unauthorized("Sign in to follow content changes".to_string()),
            revision_id: state.sync.last_revision(),
        });
    };

    let mut updates = state.sync.subscribe();

    let stream = async_stream::stream! {
        let _listener = guard;
        loop {
            let snapshot = updates.borrow_and_update().clone();
            if let Ok(data) = serde_json::to_string(&snapshot) {
                yield Ok(Event::default().event("content").data(data));
            }
            if updates.changed().await.is_err() {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
