use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};

use crate::{
    error::AppError,
    handlers::admin::sessions::parse_user_id,
    models::{
        user::{UpdateRoleRequest, UserResponse},
        PaginatedResponse, PaginationQuery,
    },
    state::AppState,
    utils::jwt::Claims,
};

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PaginatedResponse<UserResponse>>, AppError> {
    let (limit, offset) = (query.limit(), query.offset());
    let (principals, total) = state.sessions.list_principals(limit, offset).await?;
    let data = principals.iter().map(UserResponse::from).collect();
    Ok(Json(PaginatedResponse::new(data, total, limit, offset)))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateRoleRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let user_id = parse_user_id(&user_id)?;
    if user_id == claims.sub {
        return Err(AppError::BadRequest("Cannot change your own role".into()));
    }
    let updated = state.sessions.change_role(user_id, payload.role).await?;
    tracing::info!(
        admin_id = %claims.sub,
        user_id = %user_id,
        role = payload.role.as_str(),
        "Administrator changed role"
    );
    Ok(Json(UserResponse::from(&updated)))
}
