//! REST API module.
//!
//! Public content reads, admin content editing, editor sessions and record reads.

mod content;
mod editors;
mod records;

pub use content::*;
pub use editors::*;
pub use records::*;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::Session;
use crate::errors::{AppError, AppErrorWithRevision, SyncError};
use crate::sync::WriteOutcome;

/// Success response envelope.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
    pub revision_id: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn new(data: T, revision_id: i64) -> Self {
        Self {
            success: true,
            data,
            revision_id,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Response type that can be either success or error.
pub type ApiResult<T> = Result<ApiResponse<T>, AppErrorWithRevision>;

/// Create a successful API response.
pub fn success<T: Serialize>(data: T, revision_id: i64) -> ApiResult<T> {
    Ok(ApiResponse::new(data, revision_id))
}

/// Create an error API response.
pub fn error<T: Serialize>(err: AppError, revision_id: i64) -> ApiResult<T> {
    Err(AppErrorWithRevision {
        error: err,
        revision_id,
    })
}

/// Map a content write result onto the envelope. A skipped write means the
/// caller had no session.
fn write_result(
    result: Result<WriteOutcome, SyncError>,
    revision_id: i64,
) -> ApiResult<WriteOutcome> {
    match result {
        Ok(WriteOutcome::Skipped) => error(
            SyncError::Permission("no authenticated session".to_string()).into(),
            revision_id,
        ),
        Ok(outcome) => success(outcome, revision_id),
        Err(e) => error(e.into(), revision_id),
    }
}

fn require_session(session: &Session) -> Result<(), AppError> {
    if session.is_authenticated() {
        Ok(())
    } else {
        Err(AppError::Unauthorized("Sign in to edit content".to_string()))
    }
}
