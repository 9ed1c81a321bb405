//! Profile endpoints shared by both roles. Role routers mount these with their own
//! form type, e.g. `get(get_profile::<DoctorOnboardingForm>)`.

use std::sync::Arc;

use axum::extract::{Extension, Json, State};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use shared_models::auth::{Identity, User};
use shared_models::error::AppError;
use shared_models::validation::ValidationError;
use shared_utils::state::AppState;

use crate::models::{AvatarFile, LoadOutcome, OnboardingForm, ProfileRecord, Validated};
use crate::services::{AvatarUploader, ProfileLoader, ProfileSaver};

#[derive(Debug, Serialize)]
pub struct ProfileView<F> {
    /// False when no row exists yet and `form` holds defaults.
    pub exists: bool,
    pub form: F,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveProfileRequest<F> {
    #[serde(flatten)]
    pub form: F,
    /// URL returned by the avatar endpoint. Absent keeps the stored avatar.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveProfileResponse<P> {
    pub profile: P,
    pub message: String,
    pub redirect_to: String,
    pub redirect_delay_ms: u64,
    pub password_updated: bool,
}

#[derive(Debug, Deserialize)]
pub struct AvatarUploadRequest {
    pub file_name: String,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvatarUploadResponse {
    pub avatar_url: String,
}

fn uploader(state: &AppState) -> AvatarUploader {
    AvatarUploader::new(state.backend.blobs.clone(), state.config.avatar_bucket.clone())
}

pub async fn get_profile<F: OnboardingForm>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<ProfileView<F>>, AppError> {
    let identity = Identity::from(user);
    let loader = ProfileLoader::new(state.backend.records.clone());

    let view = match loader.load::<F::Profile>(&identity, auth.token()).await? {
        LoadOutcome::Found(profile) => ProfileView {
            exists: true,
            form: F::from_profile(&profile),
            avatar_url: profile.avatar_url().map(str::to_string),
        },
        LoadOutcome::NotFound => ProfileView {
            exists: false,
            form: F::default(),
            avatar_url: None,
        },
    };

    Ok(Json(view))
}

/// Runs the same validation as the interactive workflow before saving.
pub async fn save_profile<F: OnboardingForm>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<SaveProfileRequest<F>>,
) -> Result<Json<SaveProfileResponse<F::Profile>>, AppError> {
    let identity = Identity::from(user);
    debug!(
        "Saving {} profile for user: {}",
        <F::Profile as ProfileRecord>::TABLE,
        identity.id
    );

    let validated = Validated::new(request.form)?;

    let avatar_url = request.avatar_url.filter(|url| !url.trim().is_empty());
    if let Some(url) = &avatar_url {
        if !uploader(&state).is_own_upload(url, F::AVATAR_FOLDER, &identity) {
            warn!("Rejected foreign avatar URL for user: {}", identity.id);
            return Err(ValidationError::new("avatar_url", "Please upload your photo again.").into());
        }
    }

    let saver = ProfileSaver::new(state.backend.records.clone(), state.backend.identity.clone());
    let saved = saver
        .save(&identity, auth.token(), &validated, avatar_url)
        .await?;

    Ok(Json(SaveProfileResponse {
        profile: saved.profile,
        message: F::SAVED_MESSAGE.to_string(),
        redirect_to: F::DASHBOARD_ROUTE.to_string(),
        redirect_delay_ms: F::REDIRECT_DELAY_MS,
        password_updated: saved.password_updated,
    }))
}

/// Stores the photo and returns its public URL. The row is only updated by the next save.
pub async fn upload_avatar<F: OnboardingForm>(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AvatarUploadRequest>,
) -> Result<Json<AvatarUploadResponse>, AppError> {
    let identity = Identity::from(user);
    let file = AvatarFile::from_data_url(&request.file_name, &request.data_url)?;

    let avatar_url = uploader(&state)
        .upload(F::AVATAR_FOLDER, &file, &identity, auth.token())
        .await?;

    Ok(Json(AvatarUploadResponse { avatar_url }))
}
