use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use serde_json::json;
use sessionkeeper_backend::models::user::UserRole;

mod support;

use support::{
    bearer_request, body_json, cookie_request, login_with_password, seed_principal, test_app,
};

#[tokio::test]
async fn admin_routes_reject_non_administrators() {
    let app = test_app();
    let standard = seed_principal(&app, "plain@example.com", None, UserRole::Standard).await;
    let (access, _) = login_with_password(&app, "plain@example.com").await;

    let response = app
        .call(bearer_request(
            Method::GET,
            &format!("/api/admin/users/{}/sessions", standard.id),
            &access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .call(
            Request::builder()
                .uri("/api/admin/users")
                .body(Body::empty())
                .expect("build request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_lists_and_revokes_sessions_of_another_user() {
    let app = test_app();
    seed_principal(&app, "root@example.com", None, UserRole::Administrator).await;
    let target = seed_principal(&app, "target@example.com", None, UserRole::Standard).await;
    let (admin_access, _) = login_with_password(&app, "root@example.com").await;
    let (_, first_refresh) = login_with_password(&app, "target@example.com").await;
    let (_, second_refresh) = login_with_password(&app, "target@example.com").await;

    let response = app
        .call(bearer_request(
            Method::GET,
            &format!("/api/admin/users/{}/sessions", target.id),
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let sessions = body_json(response).await;
    let sessions = sessions.as_array().expect("session array");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["user_id"], target.id.to_string());
    let first_id = sessions[0]["id"].as_str().expect("session id").to_string();

    let response = app
        .call(bearer_request(
            Method::DELETE,
            &format!("/api/admin/users/{}/sessions/{first_id}", target.id),
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .call(bearer_request(
            Method::DELETE,
            &format!("/api/admin/users/{}/sessions/{first_id}", target.id),
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.call(cookie_request("/api/auth/refresh", Some(&first_refresh))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .call(bearer_request(
            Method::DELETE,
            &format!("/api/admin/users/{}/sessions", target.id),
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["revoked"], 1);

    let response = app.call(cookie_request("/api/auth/refresh", Some(&second_refresh))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_changes_roles_and_lists_users() {
    let app = test_app();
    let admin = seed_principal(&app, "boss@example.com", None, UserRole::Administrator).await;
    let target = seed_principal(&app, "promote@example.com", None, UserRole::Standard).await;
    let (admin_access, _) = login_with_password(&app, "boss@example.com").await;

    let response = app
        .call(
            Request::builder()
                .method(Method::PUT)
                .uri(format!("/api/admin/users/{}/role", target.id))
                .header(header::AUTHORIZATION, format!("Bearer {admin_access}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "role": "provider" }).to_string()))
                .expect("build role request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["role"], "provider");

    // New logins carry the new role.
    let (target_access, _) = login_with_password(&app, "promote@example.com").await;
    let claims = app.state.codec().validate_access(&target_access).expect("claims");
    assert_eq!(claims.role, UserRole::Provider);

    let response = app
        .call(
            Request::builder()
                .method(Method::PUT)
                .uri(format!("/api/admin/users/{}/role", admin.id))
                .header(header::AUTHORIZATION, format!("Bearer {admin_access}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({ "role": "standard" }).to_string()))
                .expect("build self role request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .call(bearer_request(
            Method::GET,
            "/api/admin/users?limit=1&offset=0",
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["limit"], 1);
    assert_eq!(body["data"].as_array().expect("data array").len(), 1);
}

#[tokio::test]
async fn admin_routes_validate_identifiers() {
    let app = test_app();
    seed_principal(&app, "strict@example.com", None, UserRole::Administrator).await;
    let (admin_access, _) = login_with_password(&app, "strict@example.com").await;

    let response = app
        .call(bearer_request(
            Method::GET,
            "/api/admin/users/not-a-uuid/sessions",
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .call(bearer_request(
            Method::GET,
            &format!("/api/admin/users/{}/sessions", uuid::Uuid::new_v4()),
            &admin_access,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
