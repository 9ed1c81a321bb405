use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use doctor_cell::router::{doctor_routes, emergency_routes};
use shared_database::store::BackendError;
use shared_utils::test_utils::{InMemoryBackend, JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    store: Arc<InMemoryBackend>,
    doctors: Router,
    emergency: Router,
    token: String,
}

fn setup() -> TestApp {
    let store = InMemoryBackend::new();
    let config = TestConfig::default();
    let state = config.to_state(store.backend());

    let mut user = TestUser::doctor("jane@example.com");
    user.id = "U1".to_string();
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    TestApp {
        store,
        doctors: doctor_routes(state.clone()),
        emergency: emergency_routes(state),
        token,
    }
}

fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
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

fn jane_body() -> Value {
    json!({
        "full_name": "Jane Doe",
        "gmc_number": "123456",
        "specialties": ["Dermatology"],
        "availability": ["weekday_day"],
        "consultation_modes": ["Video", "In person"],
        "clinic_details": "Leeds Road Surgery",
        "fees": { "weekday_day": "£45/h" }
    })
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = setup();

    let response = app.doctors.oneshot(request("GET", "/me", None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_without_row_returns_defaults() {
    let app = setup();

    let response = app
        .doctors
        .oneshot(request("GET", "/me", Some(&app.token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["exists"], false);
    assert_eq!(body["form"]["full_name"], "");
    assert!(body["form"].get("password").is_none());
}

#[tokio::test]
async fn test_save_and_read_back() {
    let app = setup();

    let response = app
        .doctors
        .clone()
        .oneshot(request("PUT", "/me", Some(&app.token), Some(jane_body())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["redirect_to"], "/doctor/dashboard");
    assert_eq!(body["redirect_delay_ms"], 1500);
    assert_eq!(body["password_updated"], false);

    let row = app.store.row("doctors", "U1").unwrap();
    assert_eq!(row["consultation_type"], "Video,In person");
    assert_eq!(row["availability"], "weekday_day");

    let response = app
        .doctors
        .oneshot(request("GET", "/me", Some(&app.token), None))
        .await
        .unwrap();
    let body = read_json(response).await;
    assert_eq!(body["exists"], true);
    assert_eq!(body["form"]["specialties"], json!(["Dermatology"]));
    assert_eq!(body["form"]["fees"]["weekday_day"], "£45/h");
}

#[tokio::test]
async fn test_save_runs_validation() {
    let app = setup();
    let mut body = jane_body();
    body["fees"] = json!({ "weekday_day": "£999/h" });

    let response = app
        .doctors
        .oneshot(request("PUT", "/me", Some(&app.token), Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_json(response).await["error"],
        "Please choose a fee from the list for weekdays 08:00–19:00."
    );
    assert_eq!(app.store.upsert_calls(), 0);
}

#[tokio::test]
async fn test_save_rejects_foreign_avatar() {
    let app = setup();
    let mut body = jane_body();
    body["avatar_url"] = json!("https://elsewhere.example/U1.png");

    let response = app
        .doctors
        .oneshot(request("PUT", "/me", Some(&app.token), Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_avatar_upload_then_save() {
    let app = setup();

    let response = app
        .doctors
        .clone()
        .oneshot(request(
            "POST",
            "/me/avatar",
            Some(&app.token),
            Some(json!({ "file_name": "jane.png", "data_url": "data:image/png;base64,YWJj" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let avatar_url = read_json(response).await["avatar_url"].as_str().unwrap().to_string();
    assert!(avatar_url.starts_with("https://storage.test/avatars/doctors/U1-"));
    assert!(app.store.row("doctors", "U1").is_none());

    let mut body = jane_body();
    body["avatar_url"] = json!(avatar_url);
    let response = app
        .doctors
        .oneshot(request("PUT", "/me", Some(&app.token), Some(body)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.row("doctors", "U1").unwrap()["avatar_url"], json!(avatar_url));
}

#[tokio::test]
async fn test_avatar_upload_failure_message() {
    let app = setup();
    app.store
        .fail_upload_with(BackendError::Unavailable("bucket offline".to_string()));

    let response = app
        .doctors
        .oneshot(request(
            "POST",
            "/me/avatar",
            Some(&app.token),
            Some(json!({ "file_name": "jane.png", "data_url": "data:image/png;base64,YWJj" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        read_json(response).await["error"],
        "We couldn't upload your photo. You can try again or save without a photo."
    );
}

#[tokio::test]
async fn test_dashboard() {
    let app = setup();
    app.store.insert_row(
        "doctors",
        json!({ "id": "U1", "full_name": "Jane Doe", "specialty": "Dermatology,Other" }),
    );

    let response = app
        .doctors
        .oneshot(request("GET", "/dashboard", Some(&app.token), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["title"], "Jane Doe");
    assert_eq!(body["subtitle"], "Dermatology • Other");
    assert_eq!(body["actions"][0]["route"], "/doctor/onboarding");
}

#[tokio::test]
async fn test_emergency_listing_is_public_and_sorted() {
    let app = setup();
    app.store.insert_row(
        "doctors",
        json!({
            "id": "D2", "full_name": "Zara Khan", "specialty": "Paediatrics",
            "emergency_on": true,
            "fees": "{\"emergency_home\":\"£210/h\"}"
        }),
    );
    app.store.insert_row(
        "doctors",
        json!({ "id": "D3", "full_name": "Adam Lee", "emergency_on": false }),
    );
    app.store.insert_row(
        "doctors",
        json!({
            "id": "D1", "full_name": "Amira Patel", "specialty": "General practice (GP),Cardiology",
            "emergency_on": true, "fees": "not json"
        }),
    );

    let response = app
        .emergency
        .oneshot(request("GET", "/doctors", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(
        body,
        json!([
            {
                "id": "D1",
                "name": "Amira Patel",
                "specialty": "General practice (GP) • Cardiology",
                "avatar_url": null,
                "fee_text": null
            },
            {
                "id": "D2",
                "name": "Zara Khan",
                "specialty": "Paediatrics",
                "avatar_url": null,
                "fee_text": "Emergency from £210/h"
            }
        ])
    );
}

#[tokio::test]
async fn test_emergency_listing_failure() {
    let app = setup();
    app.store
        .fail_fetch_with(BackendError::Unavailable("timeout".to_string()));

    let response = app
        .emergency
        .oneshot(request("GET", "/doctors", None, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        read_json(response).await["error"],
        "We couldn't load emergency doctors just now."
    );
}
