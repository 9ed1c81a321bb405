use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use patient_cell::router::patient_routes;
use shared_database::store::BackendError;
use shared_utils::test_utils::{InMemoryBackend, JwtTestUtils, TestConfig, TestUser};

fn setup() -> (Arc<InMemoryBackend>, Router, String) {
    let store = InMemoryBackend::new();
    let config = TestConfig::default();
    let app = patient_routes(config.to_state(store.backend()));

    let mut user = TestUser::patient("sam@example.com");
    user.id = "P1".to_string();
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    (store, app, token)
}

fn request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_save_accepts_current_address() {
    let (store, app, token) = setup();

    let response = app
        .oneshot(request(
            "PUT",
            "/me",
            &token,
            Some(json!({ "full_name": "Sam Patel", "current_address": "1 High St" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["redirect_to"], "/patient/dashboard");
    assert_eq!(body["message"], "Profile saved!");
    assert_eq!(store.row("patients", "P1").unwrap()["address"], "1 High St");
}

#[tokio::test]
async fn test_save_rejects_bad_date() {
    let (store, app, token) = setup();

    let response = app
        .oneshot(request(
            "PUT",
            "/me",
            &token,
            Some(json!({ "full_name": "Sam Patel", "date_of_birth": "12/04/1990" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["error"],
        "Please enter your date of birth as YYYY-MM-DD."
    );
    assert_eq!(store.upsert_calls(), 0);
}

#[tokio::test]
async fn test_save_failure_is_plain_message() {
    let (store, app, token) = setup();
    store.fail_upsert_with(BackendError::Rejected {
        status: 400,
        message: "column \"adress\" does not exist".to_string(),
    });

    let response = app
        .oneshot(request("PUT", "/me", &token, Some(json!({ "full_name": "Sam Patel" }))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        read_json(response).await["error"],
        "We couldn't save your profile just now. Please try again in a moment."
    );
}

#[tokio::test]
async fn test_dashboard() {
    let (store, app, token) = setup();
    store.insert_row("patients", json!({ "id": "P1", "full_name": "Sam Patel" }));

    let response = app
        .oneshot(request("GET", "/dashboard", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["title"], "Sam Patel");
    assert_eq!(body["actions"][1]["route"], "/emergency");
    assert_eq!(body["actions"][2]["label"], "Book an appointment");
}

#[tokio::test]
async fn test_dashboard_load_failure() {
    let (store, app, token) = setup();
    store.fail_fetch_with(BackendError::Unavailable("timeout".to_string()));

    let response = app
        .oneshot(request("GET", "/dashboard", &token, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        read_json(response).await["error"],
        "We couldn't load your profile just now."
    );
}
