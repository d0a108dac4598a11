#![allow(dead_code)]
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request},
    response::Response,
    Router,
};
use serde_json::Value;
use sessionkeeper_backend::{
    config::Config,
    models::user::{Principal, UserRole},
    repositories::{memory::InMemoryPrincipalStore, principal::PrincipalStore},
    routes::build_router,
    state::AppState,
    utils::cookies::{SameSite, REFRESH_COOKIE_NAME},
};
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_PASSWORD: &str = "integration-password";
pub const TEST_OTP: &str = "123456";

pub fn test_config() -> Config {
    Config {
        database_url: None,
        bind_addr: "127.0.0.1:0".parse().expect("bind addr"),
        jwt_secret: "integration-test-secret-with-enough-entropy".to_string(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_days: 7,
        max_sessions_per_user: 5,
        cookie_secure: true,
        cookie_same_site: SameSite::Strict,
        otp_fixed_code: TEST_OTP.to_string(),
        password_hash_memory_kib: 1024,
        password_hash_iterations: 1,
        password_min_length: 8,
        cors_allow_origins: vec!["*".to_string()],
        production_mode: false,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryPrincipalStore>,
}

impl TestApp {
    pub async fn call(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("call router")
    }

    pub async fn stored(&self, principal: &Principal) -> Principal {
        self.store
            .find_by_id(principal.id)
            .await
            .expect("load principal")
            .expect("principal exists")
    }
}

pub fn test_app() -> TestApp {
    let store = Arc::new(InMemoryPrincipalStore::new());
    let state = AppState::from_config(test_config(), store.clone()).expect("app state");
    TestApp {
        router: build_router(state.clone()),
        state,
        store,
    }
}

pub async fn seed_principal(
    app: &TestApp,
    email: &str,
    mobile: Option<&str>,
    role: UserRole,
) -> Principal {
    let password_hash = app
        .state
        .sessions
        .hasher()
        .hash(TEST_PASSWORD)
        .expect("hash password");
    let principal = Principal::new(
        Some(email.to_string()),
        mobile.map(str::to_string),
        Some(password_hash),
        format!("Seeded {}", role.as_str()),
        role,
    );
    app.store.save(&principal).await.expect("seed principal")
}

pub fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("build json request")
}

pub fn bearer_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("build bearer request")
}

pub fn cookie_request(uri: &str, refresh_token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(token) = refresh_token {
        builder = builder.header(header::COOKIE, format!("{REFRESH_COOKIE_NAME}={token}"));
    }
    builder.body(Body::empty()).expect("build cookie request")
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json body")
}

/// Full `Set-Cookie` header for `name`, attributes included.
pub fn set_cookie_header(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with(&prefix))
        .map(str::to_string)
}

pub fn extract_set_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .find_map(|value| {
            let value = value.to_str().ok()?;
            let token = value.strip_prefix(&prefix)?.split(';').next()?.trim();
            if token.is_empty() {
                None
            } else {
                Some(token.to_string())
            }
        })
}

pub fn is_clearing_cookie(headers: &HeaderMap) -> bool {
    set_cookie_header(headers, REFRESH_COOKIE_NAME)
        .map(|cookie| {
            cookie.starts_with(&format!("{REFRESH_COOKIE_NAME}=;")) && cookie.contains("Max-Age=0")
        })
        .unwrap_or(false)
}

/// Signs in with email and password; returns the access token and refresh cookie value.
pub async fn login_with_password(app: &TestApp, email: &str) -> (String, String) {
    let response = app
        .call(json_request(
            Method::POST,
            "/api/auth/login",
            &serde_json::json!({ "email": email, "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(response.status(), axum::http::StatusCode::OK);
    let refresh = extract_set_cookie_value(response.headers(), REFRESH_COOKIE_NAME)
        .expect("refresh cookie");
    let body = body_json(response).await;
    let access = body["access_token"]
        .as_str()
        .expect("access token")
        .to_string();
    (access, refresh)
}
