use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, SessionError},
    models::session::SessionResponse,
    state::AppState,
    types::SessionId,
    utils::jwt::Claims,
};

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let sessions = state.sessions.list_sessions(claims.sub).await?;
    Ok(Json(sessions.iter().map(SessionResponse::from).collect()))
}

/// Revokes one of the caller's own sessions.
pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let session_id = parse_session_id(&session_id)?;
    state
        .sessions
        .revoke(claims.sub, session_id)
        .await
        .map_err(not_found_for_missing_session)?;
    Ok(Json(json!({
        "message": "Session revoked",
        "session_id": session_id.to_string()
    })))
}

pub(crate) fn parse_session_id(raw: &str) -> Result<SessionId, AppError> {
    if raw.trim().is_empty() {
        return Err(AppError::BadRequest("Session ID is required".into()));
    }
    raw.parse::<SessionId>()
        .map_err(|_| AppError::BadRequest("Invalid session ID".into()))
}

/// Revocation is an authenticated call, so a missing session is reported as
/// 404 rather than folded into the generic 401.
pub(crate) fn not_found_for_missing_session(err: SessionError) -> AppError {
    match err {
        SessionError::SessionNotFound => AppError::NotFound("Session not found".into()),
        other => other.into(),
    }
}
