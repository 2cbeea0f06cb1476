//! Session authentication module.
//!
//! Resolves the caller's session from an API key, bearer token or session cookie.
//! Credentials are compared in constant time to mitigate timing attacks.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::errors::{codes, ErrorDetails, ErrorResponse};

/// Header name for the API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Cookie carrying the session credential.
pub const SESSION_COOKIE: &str = "cms_session";

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    pub display_name: String,
}

/// The caller's session. `user` is `None` for anonymous visitors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: User) -> Self {
        Self { user: Some(user) }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Name recorded as the editor of a write.
    pub fn editor(&self) -> &str {
        self.user
            .as_ref()
            .map(|u| u.email.as_str())
            .unwrap_or("anonymous")
    }
}

/// The configured admin credential and the identity it unlocks.
#[derive(Debug, Clone)]
pub struct AdminCredential {
    pub key: String,
    pub user: User,
}

/// Session layer: attaches a `Session` extension to every request.
///
/// Missing credentials yield an anonymous session; a credential that does not
/// match is rejected with 401.
pub async fn session_layer(
    admin: Option<Arc<AdminCredential>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(provided) = provided_credential(request.headers()) else {
        request.extensions_mut().insert(Session::anonymous());
        return next.run(request).await;
    };

    match admin {
        Some(admin) if constant_time_compare(&provided, &admin.key) => {
            request
                .extensions_mut()
                .insert(Session::authenticated(admin.user.clone()));
            next.run(request).await
        }
        _ => unauthorized_response("Invalid credentials"),
    }
}

/// Extract a credential from the API key header, bearer token or session cookie.
fn provided_credential(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.to_string());
    }

    if let Some(bearer) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
    {
        return Some(bearer.to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| cookie_value(value))
}

/// Cookie values may be quoted and are often percent-encoded.
fn cookie_value(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = trimmed
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(trimmed);
    match urlencoding::decode(unquoted) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => unquoted.to_string(),
    }
}

/// Perform constant-time string comparison.
fn constant_time_compare(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Create an unauthorized response.
pub fn unauthorized_response(message: &str) -> Response {
    let body = ErrorResponse {
        success: false,
        error: ErrorDetails {
            code: codes::UNAUTHORIZED.to_string(),
            message: message.to_string(),
            details: None,
        },
        revision_id: 0,
    };

    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
