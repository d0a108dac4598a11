use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::repositories::principal::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Failures of the session lifecycle.
///
/// The variants exist for logging and tests; at the HTTP boundary every
/// authentication-path variant collapses into the same 401 response.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed")]
    AuthenticationFailed,
    #[error("refresh token is invalid")]
    InvalidRefreshToken,
    #[error("refresh token has expired")]
    RefreshExpired,
    #[error("session has expired")]
    SessionExpired,
    #[error("session not found")]
    SessionNotFound,
    #[error("principal not found")]
    PrincipalNotFound,
    #[error("account already exists")]
    AlreadyExists,
    #[error("{0}")]
    InvalidInput(String),
    #[error(transparent)]
    Store(StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SessionError {
    /// True for every failure that must reach the client as a plain 401.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            SessionError::AuthenticationFailed
                | SessionError::InvalidRefreshToken
                | SessionError::RefreshExpired
                | SessionError::SessionExpired
                | SessionError::SessionNotFound
        )
    }
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => SessionError::AlreadyExists,
            other => SessionError::Store(other),
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Conflict(String),
    BadRequest(String),
    InternalServerError(anyhow::Error),
    Validation(Vec<String>),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, code, details) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND".to_string(), None),
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                msg,
                "UNAUTHORIZED".to_string(),
                None,
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN".to_string(), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT".to_string(), None),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                msg,
                "BAD_REQUEST".to_string(),
                None,
            ),
            AppError::InternalServerError(err) => {
                tracing::error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    "INTERNAL_SERVER_ERROR".to_string(),
                    None,
                )
            }
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                "VALIDATION_ERROR".to_string(),
                Some(serde_json::json!({ "errors": errors })),
            ),
        };

        let body = Json(ErrorResponse {
            error: error_message,
            code,
            details,
        });

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalServerError(err)
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        if err.is_authentication_failure() {
            tracing::debug!(reason = %err, "Rejecting request as unauthorized");
            return AppError::Unauthorized("Unauthorized".to_string());
        }
        match err {
            SessionError::PrincipalNotFound => AppError::NotFound("User not found".to_string()),
            SessionError::AlreadyExists => AppError::Conflict("Account already exists".to_string()),
            SessionError::InvalidInput(msg) => AppError::BadRequest(msg),
            SessionError::Store(store) => AppError::InternalServerError(store.into()),
            SessionError::Internal(inner) => AppError::InternalServerError(inner),
            other => AppError::InternalServerError(anyhow::anyhow!(other.to_string())),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| {
                    let code = e.code.as_ref();
                    format!("{}: {}", field, code)
                })
            })
            .collect();
        AppError::Validation(messages)
    }
}
