//! Webhook signature verification through the HTTP stack.
//!
//! Only paths that stop before touching the database are exercised here;
//! crediting is covered by the database-backed tests in `flows.rs`.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{body_json, send, LS_WEBHOOK_SECRET, STRIPE_WEBHOOK_SECRET};
use roastme_core::hashing::hmac_sha256_hex;
use serde_json::json;

fn stripe_request(body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/stripe")
        .header("stripe-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn stripe_signature(body: &str, secret: &str) -> String {
    let t = chrono::Utc::now().timestamp();
    let sig = hmac_sha256_hex(secret.as_bytes(), format!("{t}.{body}").as_bytes());
    format!("t={t},v1={sig}")
}

fn ls_request(body: &str, signature: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/v1/webhooks/lemonsqueezy")
        .header("x-signature", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ---------------------------------------------------------------------------
// Test: Stripe rejects a bad or missing signature
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stripe_bad_signature_returns_400() {
    let app = common::build_test_app().await;
    let body = json!({"type": "checkout.session.completed", "data": {"object": {}}}).to_string();

    let forged = stripe_signature(&body, "wrong-secret");
    let response = send(app.router.clone(), stripe_request(&body, &forged)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(app.router, stripe_request(&body, "")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: Stripe acknowledges events it does not act on
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stripe_unhandled_event_is_acknowledged() {
    let app = common::build_test_app().await;
    let body = json!({"type": "invoice.created", "data": {"object": {"id": "in_1"}}}).to_string();

    let signature = stripe_signature(&body, STRIPE_WEBHOOK_SECRET);
    let response = send(app.router, stripe_request(&body, &signature)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);
    assert_eq!(json["outcome"], "ignored");
}

// ---------------------------------------------------------------------------
// Test: Stripe rejects a signed but malformed body
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stripe_malformed_payload_returns_400() {
    let app = common::build_test_app().await;
    let body = "{\"not\": \"an event\"}";

    let signature = stripe_signature(body, STRIPE_WEBHOOK_SECRET);
    let response = send(app.router, stripe_request(body, &signature)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: Lemon Squeezy verifies X-Signature
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lemonsqueezy_signature_is_checked() {
    let app = common::build_test_app().await;
    let body = json!({"meta": {"event_name": "subscription_created"}, "data": {}}).to_string();

    let response = send(app.router.clone(), ls_request(&body, "deadbeef")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let signature = hmac_sha256_hex(LS_WEBHOOK_SECRET.as_bytes(), body.as_bytes());
    let response = send(app.router, ls_request(&body, &signature)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["outcome"], "ignored");
}
