use std::sync::Arc;

use axum::extract::{Extension, Json, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use tracing::debug;

use shared_models::auth::{Identity, User};
use shared_models::error::AppError;
use shared_utils::state::AppState;
use onboarding_cell::models::DashboardView;

use crate::services::PatientDashboardService;

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<DashboardView>, AppError> {
    debug!("Loading patient dashboard for user: {}", user.id);

    let service = PatientDashboardService::new(state.backend.records.clone());
    let view = service.load(&Identity::from(user), auth.token()).await?;

    Ok(Json(view))
}
