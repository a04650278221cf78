use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn openapi_contract_contains_api_paths() {
    let app = Router::new().route("/api/v1/openapi.json", get(crate::openapi_json));
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/openapi.json")
        .header("host", "localhost:8000")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json body");

    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload.get("openapi").and_then(Value::as_str), Some("3.0.3"));
    assert!(payload.pointer("/paths/~1health/get").is_some());
    assert!(payload.pointer("/paths/~1api~1v1~1auth~1login/post").is_some());
    assert!(payload
        .pointer("/paths/~1api~1v1~1auth~1register/post")
        .is_some());
    assert!(payload
        .pointer("/paths/~1api~1v1~1auth~1refresh-token/post")
        .is_some());
    assert!(payload.pointer("/paths/~1api~1v1~1babies/post").is_some());
    assert!(payload
        .pointer("/paths/~1api~1v1~1babies~1{baby_id}~1activities/get")
        .is_some());
    assert!(payload
        .pointer("/paths/~1api~1v1~1care-team~1{member_id}/delete")
        .is_some());
    assert!(payload
        .pointer("/components/securitySchemes/bearerAuth")
        .is_some());
}

#[tokio::test]
async fn openapi_server_url_follows_host_header() {
    let app = Router::new().route("/api/v1/openapi.json", get(crate::openapi_json));
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/openapi.json")
        .header("host", "care.example.com")
        .header("x-forwarded-proto", "https")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let payload: Value = serde_json::from_slice(&body).expect("json body");

    assert_eq!(
        payload.pointer("/servers/0/url").and_then(Value::as_str),
        Some("https://care.example.com")
    );
}
