use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::{error::AppError, models::user::UserRole, state::AppState, utils::jwt::Claims};

/// Requires a valid bearer access token and exposes its [`Claims`] to handlers.
///
/// Access tokens are stateless: signature and expiry decide, the session
/// store is never consulted.
pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate_request(request.headers(), &state)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

// Auth + require administrator role for admin-only routes
pub async fn auth_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate_request(request.headers(), &state)?;
    if claims.role != UserRole::Administrator {
        tracing::info!(user_id = %claims.sub, "Non-administrator denied admin route");
        return Err(AppError::Forbidden("Forbidden".into()));
    }
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn authenticate_request(headers: &HeaderMap, state: &AppState) -> Result<Claims, AppError> {
    let unauthorized = || AppError::Unauthorized("Unauthorized".into());
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_bearer_token)
        .ok_or_else(unauthorized)?;

    state.codec().validate_access(token).map_err(|err| {
        tracing::debug!(reason = %err, "Access token rejected");
        unauthorized()
    })
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_scheme_case_insensitively() {
        assert_eq!(parse_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(parse_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER   abc  "), Some("abc"));
    }

    #[test]
    fn rejects_other_schemes_and_empty_tokens() {
        assert_eq!(parse_bearer_token("Basic dXNlcjpwYXNz"), None);
        assert_eq!(parse_bearer_token("Bearer "), None);
        assert_eq!(parse_bearer_token("Bearer"), None);
        assert_eq!(parse_bearer_token(""), None);
    }
}
