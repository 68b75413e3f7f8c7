//! Request validation that happens before any database access.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, get, post_json, send};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: waitlist rejects an invalid email
// ---------------------------------------------------------------------------

#[tokio::test]
async fn waitlist_rejects_invalid_email() {
    let app = common::build_test_app().await;
    let response = post_json(
        app.router,
        "/api/v1/waitlist",
        json!({"email": "not-an-email", "source": "landing"}),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: malformed JSON bodies are rejected by the extractor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn waitlist_requires_json_body() {
    let app = common::build_test_app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/waitlist")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\":"))
        .unwrap();
    let response = send(app.router, request).await;

    assert!(response.status().is_client_error());
}

// ---------------------------------------------------------------------------
// Test: non-numeric character ids are rejected
// ---------------------------------------------------------------------------

#[tokio::test]
async fn character_id_must_be_numeric() {
    let app = common::build_test_app().await;
    let response = get(app.router, "/api/v1/characters/not-a-number").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: wrong method on a known route
// ---------------------------------------------------------------------------

#[tokio::test]
async fn wrong_method_returns_405() {
    let app = common::build_test_app().await;
    let request = Request::builder()
        .method(Method::DELETE)
        .uri("/api/v1/gallery")
        .body(Body::empty())
        .unwrap();
    let response = send(app.router, request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
