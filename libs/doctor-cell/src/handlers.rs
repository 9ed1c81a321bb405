use std::sync::Arc;

use axum::extract::{Extension, Json, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_models::auth::{Identity, User};
use shared_models::error::AppError;
use shared_utils::state::AppState;
use onboarding_cell::models::DashboardView;

use crate::models::EmergencyDoctorCard;
use crate::services::{DoctorDashboardService, EmergencyService};

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<DashboardView>, AppError> {
    debug!("Loading doctor dashboard for user: {}", user.id);

    let service = DoctorDashboardService::new(state.backend.records.clone());
    let view = service.load(&Identity::from(user), auth.token()).await?;

    Ok(Json(view))
}

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn emergency_doctors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<EmergencyDoctorCard>>, AppError> {
    let service = EmergencyService::new(state.backend.records.clone());
    let cards = service.list(None).await?;

    Ok(Json(cards))
}
