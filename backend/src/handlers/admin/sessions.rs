use axum::{
    extract::{Extension, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::str::FromStr;
use utoipa::ToSchema;

use crate::{
    error::AppError,
    handlers::sessions::{not_found_for_missing_session, parse_session_id},
    models::session::Session,
    state::AppState,
    types::UserId,
    utils::jwt::Claims,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminSessionResponse {
    pub id: String,
    pub user_id: String,
    pub device_label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSessionResponse {
    fn from_session(user_id: UserId, session: &Session) -> Self {
        Self {
            id: session.id.to_string(),
            user_id: user_id.to_string(),
            device_label: session.device_label.clone(),
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
        }
    }
}

pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, AppError> {
    UserId::from_str(raw).map_err(|_| AppError::BadRequest("Invalid user ID".into()))
}

pub async fn list_user_sessions(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<AdminSessionResponse>>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let sessions = state.sessions.list_sessions(user_id).await?;
    Ok(Json(
        sessions
            .iter()
            .map(|session| AdminSessionResponse::from_session(user_id, session))
            .collect(),
    ))
}

pub async fn revoke_user_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((user_id, session_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let session_id = parse_session_id(&session_id)?;
    state
        .sessions
        .revoke(user_id, session_id)
        .await
        .map_err(not_found_for_missing_session)?;
    tracing::info!(
        admin_id = %claims.sub,
        user_id = %user_id,
        session_id = %session_id,
        "Administrator revoked session"
    );
    Ok(Json(json!({
        "message": "Session revoked",
        "session_id": session_id.to_string()
    })))
}

pub async fn revoke_all_user_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    let removed = state.sessions.revoke_all(user_id).await?;
    tracing::info!(
        admin_id = %claims.sub,
        user_id = %user_id,
        removed,
        "Administrator revoked all sessions"
    );
    Ok(Json(json!({
        "message": "Sessions revoked",
        "revoked": removed
    })))
}
