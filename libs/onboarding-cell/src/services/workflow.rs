use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use auth_cell::models::{SessionError, SessionOutcome};
use auth_cell::services::SessionResolver;
use shared_database::store::Backend;
use shared_models::auth::Identity;
use shared_models::routes;

use crate::models::{
    AvatarFile, AvatarPreview, LoadOutcome, Navigation, OnboardingForm, ProfileRecord,
    SubmitOutcome, UploadError, Validated, WorkflowStatus,
};
use crate::services::{lock, AvatarTracker, AvatarUploader, ProfileLoader, ProfileSaver};

/// Drives one onboarding session for a role: resolve the session, load or default the
/// form, accept edits and avatar picks, then validate and save.
///
/// Every transition is published on a watch channel; see [`OnboardingWorkflow::subscribe`].
pub struct OnboardingWorkflow<F: OnboardingForm> {
    resolver: SessionResolver,
    loader: ProfileLoader,
    saver: ProfileSaver,
    avatar: AvatarTracker,
    access_token: Option<String>,
    identity: Mutex<Option<Identity>>,
    form: Mutex<F>,
    prefilled: AtomicBool,
    submitting: AtomicBool,
    status: watch::Sender<WorkflowStatus>,
}

impl<F: OnboardingForm> OnboardingWorkflow<F> {
    pub fn new(backend: &Backend, avatar_bucket: &str, access_token: Option<String>) -> Self {
        let (status, _) = watch::channel(WorkflowStatus::Initializing);
        let uploader = AvatarUploader::new(backend.blobs.clone(), avatar_bucket);

        Self {
            resolver: SessionResolver::new(backend.identity.clone()),
            loader: ProfileLoader::new(backend.records.clone()),
            saver: ProfileSaver::new(backend.records.clone(), backend.identity.clone()),
            avatar: AvatarTracker::new(uploader, F::AVATAR_FOLDER),
            access_token,
            identity: Mutex::new(None),
            form: Mutex::new(F::default()),
            prefilled: AtomicBool::new(false),
            submitting: AtomicBool::new(false),
            status,
        }
    }

    pub fn status(&self) -> WorkflowStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowStatus> {
        self.status.subscribe()
    }

    fn publish(&self, status: WorkflowStatus) {
        debug!("Onboarding status: {:?}", status);
        self.status.send_replace(status);
    }

    fn ready(&self, notice: Option<String>) -> WorkflowStatus {
        WorkflowStatus::Ready {
            prefilled: self.prefilled.load(Ordering::SeqCst),
            notice,
        }
    }

    pub fn identity(&self) -> Option<Identity> {
        lock(&self.identity).clone()
    }

    pub fn form(&self) -> F {
        lock(&self.form).clone()
    }

    pub fn avatar_preview(&self) -> AvatarPreview {
        self.avatar.preview()
    }

    pub fn avatar_error(&self) -> Option<UploadError> {
        self.avatar.error()
    }

    /// Resolves the session and loads the row. Runs from `Initializing`, and again from
    /// `LoadFailed` as a retry; otherwise returns the current status untouched.
    pub async fn initialize(&self) -> WorkflowStatus {
        if !matches!(
            self.status(),
            WorkflowStatus::Initializing | WorkflowStatus::LoadFailed { .. }
        ) {
            return self.status();
        }
        self.publish(WorkflowStatus::Initializing);

        let identity = match self.resolver.resolve(self.access_token.as_deref()).await {
            Ok(SessionOutcome::Authenticated(identity)) => identity,
            Ok(SessionOutcome::Unauthenticated) => {
                info!("No signed-in user, sending to sign-in");
                self.publish(WorkflowStatus::Unauthenticated {
                    redirect_to: routes::SIGN_IN.to_string(),
                });
                return self.status();
            }
            Err(e @ SessionError::Unavailable) => {
                self.publish(WorkflowStatus::LoadFailed {
                    message: e.to_string(),
                });
                return self.status();
            }
        };

        let token = self.access_token.clone().unwrap_or_default();
        let outcome = self.loader.load::<F::Profile>(&identity, &token).await;

        let next = match outcome {
            Ok(LoadOutcome::Found(profile)) => {
                *lock(&self.form) = F::from_profile(&profile);
                self.avatar.reset(profile.avatar_url().map(str::to_string));
                self.prefilled.store(true, Ordering::SeqCst);
                self.ready(None)
            }
            Ok(LoadOutcome::NotFound) => {
                *lock(&self.form) = F::default();
                self.avatar.reset(None);
                self.prefilled.store(false, Ordering::SeqCst);
                self.ready(None)
            }
            Err(e) => WorkflowStatus::LoadFailed {
                message: e.to_string(),
            },
        };

        *lock(&self.identity) = Some(identity);
        self.publish(next);
        self.status()
    }

    /// Applies `change` to the form. Returns false outside `Ready`/`SubmitFailed`.
    pub fn edit(&self, change: impl FnOnce(&mut F)) -> bool {
        if !self.status().is_editable() {
            return false;
        }
        let mut form = lock(&self.form);
        change(&mut *form);
        true
    }

    /// Shows the picked file right away and uploads it in the background. Refused with
    /// `Busy` outside `Ready`/`SubmitFailed`.
    pub fn choose_avatar(&self, file: AvatarFile) -> Result<AvatarPreview, UploadError> {
        if !self.status().is_editable() {
            return Err(UploadError::Busy);
        }
        let identity = self.identity().ok_or(UploadError::NotSignedIn)?;
        let token = self.access_token.as_deref().unwrap_or_default();

        self.avatar.choose(file, &identity, token)
    }

    /// Leaves `SubmitFailed` for `Ready` with the form as it was.
    pub fn resume(&self) -> WorkflowStatus {
        if matches!(self.status(), WorkflowStatus::SubmitFailed { .. }) {
            self.publish(self.ready(None));
        }
        self.status()
    }

    pub async fn submit(&self) -> SubmitOutcome {
        if !self.status().is_editable() {
            debug!("Submit ignored in status {:?}", self.status());
            return SubmitOutcome::Ignored;
        }
        if self
            .submitting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Submit ignored, another one is running");
            return SubmitOutcome::Ignored;
        }

        let outcome = self.run_submit().await;
        self.submitting.store(false, Ordering::SeqCst);
        outcome
    }

    async fn run_submit(&self) -> SubmitOutcome {
        let Some(identity) = self.identity() else {
            return SubmitOutcome::Ignored;
        };

        let validated = match Validated::new(self.form()) {
            Ok(validated) => validated,
            Err(e) => {
                debug!("Form invalid on {}: {}", e.field, e.message);
                self.publish(self.ready(Some(e.message.clone())));
                return SubmitOutcome::Invalid(e);
            }
        };

        self.publish(WorkflowStatus::Submitting);

        let avatar = self.avatar.settle().await;
        let warning = avatar.error.as_ref().map(|e| {
            warn!("Saving profile without the new photo: {}", e);
            e.to_string()
        });

        let token = self.access_token.clone().unwrap_or_default();
        match self
            .saver
            .save(&identity, &token, &validated, avatar.uploaded_url)
            .await
        {
            Ok(saved) => {
                info!(
                    "Saved {} profile for user: {} (password updated: {})",
                    <F::Profile as ProfileRecord>::TABLE,
                    identity.id,
                    saved.password_updated
                );
                let navigation = Navigation::new(F::DASHBOARD_ROUTE, F::REDIRECT_DELAY_MS);
                self.publish(WorkflowStatus::SubmitSucceeded {
                    navigation: navigation.clone(),
                    message: F::SAVED_MESSAGE.to_string(),
                    warning,
                });
                SubmitOutcome::Succeeded(navigation)
            }
            Err(e) => {
                self.publish(WorkflowStatus::SubmitFailed {
                    message: e.to_string(),
                });
                SubmitOutcome::Failed(e)
            }
        }
    }
}
