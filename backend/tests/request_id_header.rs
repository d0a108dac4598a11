use axum::{
    body::Body,
    http::{Request, StatusCode},
    Extension,
};
use sessionkeeper_backend::middleware::request_id::{request_id, RequestId};
use tower::ServiceExt;
use uuid::Uuid;

fn echo_router() -> axum::Router {
    axum::Router::new()
        .route(
            "/test",
            axum::routing::get(|Extension(id): Extension<RequestId>| async move { id.0 }),
        )
        .layer(axum::middleware::from_fn(request_id))
}

#[tokio::test]
async fn generated_request_id_is_a_uuid_and_visible_to_handlers() {
    let response = echo_router()
        .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(Uuid::parse_str(&id).is_ok());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, id.as_bytes());
}

#[tokio::test]
async fn client_request_id_is_echoed() {
    let response = echo_router()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-request-id", "client-req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "client-req-123");
}

#[tokio::test]
async fn correlation_id_is_used_when_request_id_is_absent() {
    let response = echo_router()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-correlation-id", "corr-req-456")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), "corr-req-456");
}

#[tokio::test]
async fn oversized_client_id_is_replaced() {
    let oversized = "x".repeat(200);
    let response = echo_router()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-request-id", oversized.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}
