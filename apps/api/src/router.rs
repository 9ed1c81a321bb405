use std::sync::Arc;

use axum::{routing::get, Router};

use auth_cell::router::auth_routes;
use doctor_cell::router::{doctor_routes, emergency_routes};
use patient_cell::router::patient_routes;
use shared_utils::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Dr. Sam API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/emergency", emergency_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use shared_utils::test_utils::{InMemoryBackend, JwtTestUtils, TestConfig, TestUser};

    #[tokio::test]
    async fn test_cells_are_mounted() {
        let store = InMemoryBackend::new();
        store.insert_row(
            "doctors",
            json!({ "id": "D1", "full_name": "Dr. Jane Doe", "specialty": "Cardiology", "emergency_on": true }),
        );
        let app = create_router(TestConfig::default().to_state(store.backend()));

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/emergency/doctors").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doctors: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(doctors[0]["name"], "Dr. Jane Doe");

        let response = app
            .clone()
            .oneshot(Request::builder().uri("/patients/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let config = TestConfig::default();
        let token = JwtTestUtils::create_test_token(&TestUser::doctor("jane@example.com"), &config.jwt_secret, Some(1));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/doctors/me")
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
