#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::admin::AdminSessionResponse,
    models::{
        session::SessionResponse,
        user::{
            ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest,
            UpdateRoleRequest, UserResponse, UserRole,
        },
        PaginationQuery,
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        register_doc,
        login_doc,
        refresh_doc,
        logout_doc,
        logout_all_doc,
        me_doc,
        change_password_doc,
        list_sessions_doc,
        revoke_session_doc,
        admin_list_users_doc,
        admin_update_role_doc,
        admin_list_user_sessions_doc,
        admin_revoke_user_session_doc,
        admin_revoke_all_user_sessions_doc
    ),
    components(
        schemas(
            // auth
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            // users
            UserResponse,
            UserRole,
            UpdateRoleRequest,
            // sessions
            SessionResponse,
            AdminSessionResponse
        )
    ),
    modifiers(&SecuritySchemes),
    tags(
        (name = "Auth", description = "Login, refresh rotation, logout and password"),
        (name = "Sessions", description = "Device sessions of the signed-in user"),
        (name = "Admin", description = "Administrator session and role management")
    ),
    security(("BearerAuth" = []))
)]
pub struct ApiDoc;

struct SecuritySchemes;

impl Modify for SecuritySchemes {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_default();

        let mut bearer = Http::new(HttpAuthScheme::Bearer);
        bearer.bearer_format = Some("JWT".to_string());

        components.add_security_scheme("BearerAuth", SecurityScheme::Http(bearer));
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in; refresh token set as cookie", body = LoginResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email or mobile already registered")
    ),
    tag = "Auth",
    security(())
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in; refresh token set as cookie", body = LoginResponse),
        (status = 400, description = "Neither credential pair supplied"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Auth",
    security(())
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Session rotated; new refresh cookie", body = LoginResponse),
        (status = 401, description = "Unauthorized; refresh cookie cleared")
    ),
    tag = "Auth",
    security(())
)]
fn refresh_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session removed if the cookie matched one; cookie cleared", body = serde_json::Value)),
    tag = "Auth",
    security(())
)]
fn logout_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout-all",
    responses((status = 200, description = "Every session of the caller revoked", body = serde_json::Value)),
    tag = "Auth"
)]
fn logout_all_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Signed-in principal", body = UserResponse)),
    tag = "Auth"
)]
fn me_doc() {}

#[utoipa::path(
    put,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed; every session revoked", body = serde_json::Value),
        (status = 400, description = "New password rejected"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Auth"
)]
fn change_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/sessions",
    responses((status = 200, description = "Live sessions, secrets redacted", body = [SessionResponse])),
    tag = "Sessions"
)]
fn list_sessions_doc() {}

#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session revoked", body = serde_json::Value),
        (status = 404, description = "No such session")
    ),
    tag = "Sessions"
)]
fn revoke_session_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PaginationQuery),
    responses((status = 200, description = "Paginated principals", body = serde_json::Value)),
    tag = "Admin"
)]
fn admin_list_users_doc() {}

#[utoipa::path(
    put,
    path = "/api/admin/users/{user_id}/role",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = UserResponse),
        (status = 404, description = "No such user")
    ),
    tag = "Admin"
)]
fn admin_update_role_doc() {}

#[utoipa::path(
    get,
    path = "/api/admin/users/{user_id}/sessions",
    params(("user_id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Sessions of the user", body = [AdminSessionResponse])),
    tag = "Admin"
)]
fn admin_list_user_sessions_doc() {}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{user_id}/sessions/{id}",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("id" = String, Path, description = "Session ID")
    ),
    responses(
        (status = 200, description = "Session revoked", body = serde_json::Value),
        (status = 404, description = "No such session")
    ),
    tag = "Admin"
)]
fn admin_revoke_user_session_doc() {}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{user_id}/sessions",
    params(("user_id" = String, Path, description = "User ID")),
    responses((status = 200, description = "Every session of the user revoked", body = serde_json::Value)),
    tag = "Admin"
)]
fn admin_revoke_all_user_sessions_doc() {}
