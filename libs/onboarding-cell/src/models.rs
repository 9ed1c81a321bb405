use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use auth_cell::models::PasswordChange;
use shared_models::auth::Identity;
use shared_models::error::AppError;
use shared_models::validation::ValidationError;

/// A stored profile row. One row per identity, keyed on `id`.
pub trait ProfileRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const TABLE: &'static str;

    fn avatar_url(&self) -> Option<&str>;
}

/// Editable form for one role. Fields mirror the row but use edit-friendly types
/// (plain strings, empty meaning absent).
pub trait OnboardingForm:
    Serialize + DeserializeOwned + Clone + Default + Send + Sync + 'static
{
    type Profile: ProfileRecord;

    /// Folder inside the avatar bucket.
    const AVATAR_FOLDER: &'static str;
    const DASHBOARD_ROUTE: &'static str;
    const SAVED_MESSAGE: &'static str;
    /// How long the confirmation stays up before navigating.
    const REDIRECT_DELAY_MS: u64;

    fn from_profile(profile: &Self::Profile) -> Self;

    /// First failing rule wins.
    fn validate(&self) -> Result<(), ValidationError>;

    /// `avatar_url` of `None` leaves the stored avatar untouched.
    fn to_profile(&self, identity: &Identity, avatar_url: Option<String>) -> Self::Profile;

    fn password_change(&self) -> &PasswordChange;
}

/// A form that passed [`OnboardingForm::validate`]. The saver only accepts these.
#[derive(Debug, Clone)]
pub struct Validated<F>(F);

impl<F: OnboardingForm> Validated<F> {
    pub fn new(form: F) -> Result<Self, ValidationError> {
        form.validate()?;
        Ok(Self(form))
    }

    pub fn form(&self) -> &F {
        &self.0
    }

    pub fn into_inner(self) -> F {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome<P> {
    Found(P),
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved<P> {
    pub profile: P,
    pub password_updated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub route: String,
    pub delay_ms: u64,
}

impl Navigation {
    pub fn new(route: &str, delay_ms: u64) -> Self {
        Self {
            route: route.to_string(),
            delay_ms,
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowStatus {
    Initializing,
    Unauthenticated {
        redirect_to: String,
    },
    LoadFailed {
        message: String,
    },
    Ready {
        prefilled: bool,
        notice: Option<String>,
    },
    Submitting,
    SubmitSucceeded {
        navigation: Navigation,
        message: String,
        warning: Option<String>,
    },
    SubmitFailed {
        message: String,
    },
}

impl WorkflowStatus {
    /// Form edits and submits are only accepted in these states.
    pub fn is_editable(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Ready { .. } | WorkflowStatus::SubmitFailed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Succeeded(Navigation),
    /// Not ready, or another submit is already running.
    Ignored,
    Invalid(ValidationError),
    Failed(SaveError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AvatarPreview {
    None,
    /// `data:` URL of a file that has not been uploaded yet.
    Local(String),
    Persisted(String),
}

impl AvatarPreview {
    pub fn url(&self) -> Option<&str> {
        match self {
            AvatarPreview::None => None,
            AvatarPreview::Local(url) | AvatarPreview::Persisted(url) => Some(url),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// One entry on a dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardAction {
    pub label: String,
    pub route: String,
}

impl DashboardAction {
    pub fn new(label: &str, route: &str) -> Self {
        Self {
            label: label.to_string(),
            route: route.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardView {
    pub title: String,
    pub subtitle: Option<String>,
    pub avatar_url: Option<String>,
    pub actions: Vec<DashboardAction>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("We couldn't load your profile just now.")]
    Unavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("We couldn't upload your photo. You can try again or save without a photo.")]
    Failed,

    #[error("Please choose an image file for your photo.")]
    NotAnImage,

    #[error("We couldn't read that file. Please choose another photo.")]
    Unreadable,

    #[error("Please sign in before adding a photo.")]
    NotSignedIn,

    #[error("Please wait until your profile has finished loading or saving.")]
    Busy,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveError {
    #[error("We couldn't save your profile just now. Please try again in a moment.")]
    Profile,

    #[error("Your profile was saved, but we couldn't update your password. Please try again.")]
    Credentials { profile_saved: bool },
}

impl From<LoadError> for AppError {
    fn from(err: LoadError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Failed => AppError::ExternalService(err.to_string()),
            UploadError::NotSignedIn => AppError::Auth(err.to_string()),
            UploadError::NotAnImage | UploadError::Unreadable | UploadError::Busy => {
                AppError::BadRequest(err.to_string())
            }
        }
    }
}

impl From<SaveError> for AppError {
    fn from(err: SaveError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}
