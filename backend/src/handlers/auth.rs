use axum::{
    extract::{Extension, State},
    http::{
        header::{SET_COOKIE, USER_AGENT},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    error::AppError,
    models::user::{
        ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest, UserResponse,
    },
    services::session_manager::{IssuedSession, LoginCredentials, NewPrincipal},
    state::AppState,
    utils::{
        cookies::{build_clear_refresh_cookie, build_refresh_cookie, refresh_token_from_headers},
        jwt::Claims,
    },
};

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;
    let device_label = device_label(payload.device_label, &headers);
    let issued = state
        .sessions
        .register(
            NewPrincipal {
                email: payload.email,
                password: payload.password,
                full_name: payload.full_name,
                mobile: payload.mobile,
            },
            device_label,
        )
        .await?;
    Ok(token_response(&state, StatusCode::CREATED, issued))
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    let credentials = LoginCredentials::from_request(&payload).ok_or_else(|| {
        AppError::BadRequest("Provide email and password, or mobile and otp".into())
    })?;
    let device_label = device_label(payload.device_label, &headers);
    let issued = state.sessions.login(credentials, device_label).await?;
    Ok(token_response(&state, StatusCode::OK, issued))
}

/// Rotates the refresh cookie. Any failure clears it so the client stops
/// retrying a token that can never succeed again.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(token) = refresh_token_from_headers(&headers) else {
        return with_cleared_cookie(
            &state,
            AppError::Unauthorized("Unauthorized".into()).into_response(),
        );
    };
    match state.sessions.refresh(&token).await {
        Ok(issued) => token_response(&state, StatusCode::OK, issued),
        Err(err) => with_cleared_cookie(&state, AppError::from(err).into_response()),
    }
}

/// Idempotent: always answers 200 and clears the refresh cookie, whatever the
/// state of the presented token.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let token = refresh_token_from_headers(&headers);
    let response = match state.sessions.logout(token.as_deref()).await {
        Ok(_) => Json(json!({ "message": "Logged out" })).into_response(),
        Err(err) => AppError::from(err).into_response(),
    };
    with_cleared_cookie(&state, response)
}

pub async fn logout_all(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    let removed = state.sessions.revoke_all(claims.sub).await?;
    let body = Json(json!({ "message": "Logged out of all sessions", "revoked": removed }));
    Ok(with_cleared_cookie(&state, body.into_response()))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, AppError> {
    let principal = state.sessions.principal(claims.sub).await?;
    Ok(Json(UserResponse::from(&principal)))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;
    let removed = state
        .sessions
        .change_password(claims.sub, &payload.current_password, &payload.new_password)
        .await?;
    let body: Json<Value> = Json(json!({
        "message": "Password updated; sign in again on every device",
        "revoked": removed
    }));
    Ok(with_cleared_cookie(&state, body.into_response()))
}

fn token_response(state: &AppState, status: StatusCode, issued: IssuedSession) -> Response {
    let max_age = (issued.refresh_token.expires_at - Utc::now()).num_seconds();
    let cookie = build_refresh_cookie(
        &issued.refresh_token.token,
        max_age,
        state.config.cookie_options(),
    );
    let body = LoginResponse {
        access_token: issued.access_token.token,
        token_type: "Bearer".to_string(),
        expires_at: issued.access_token.expires_at,
        user: UserResponse::from(&issued.principal),
    };
    (status, [(SET_COOKIE, cookie)], Json(body)).into_response()
}

fn with_cleared_cookie(state: &AppState, mut response: Response) -> Response {
    let cookie = build_clear_refresh_cookie(state.config.cookie_options());
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

/// Explicit label from the body, else the client's `User-Agent`.
fn device_label(explicit: Option<String>, headers: &HeaderMap) -> Option<String> {
    explicit.filter(|label| !label.trim().is_empty()).or_else(|| {
        headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    })
}
