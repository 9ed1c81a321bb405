use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::state::AppState;
use onboarding_cell::handlers::{get_profile, save_profile, upload_avatar};

use crate::handlers;
use crate::models::PatientOnboardingForm;

pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/me",
            get(get_profile::<PatientOnboardingForm>).put(save_profile::<PatientOnboardingForm>),
        )
        .route("/me/avatar", post(upload_avatar::<PatientOnboardingForm>))
        .route("/dashboard", get(handlers::dashboard))
        .layer(middleware::from_fn_with_state(
            state.config.clone(),
            auth_middleware,
        ))
        .with_state(state)
}
